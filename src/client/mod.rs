//! Database access: connection handling, SQL builders and repositories for
//! the catalog objects the provider manages.

pub mod config;
pub mod database;
pub mod error;
pub mod event_trigger;
pub mod function;
pub mod pool;
pub mod queries;
pub mod quote;
pub mod role;
mod tx;

pub use config::{ClientConfig, ClientConfigBuilder, Scheme, SslMode};
pub use database::{DatabaseModel, DatabaseRepository};
pub use error::{ClientError, Result};
pub use event_trigger::{
    EventTriggerCreateParams, EventTriggerModel, EventTriggerRepository, EventTriggerUpdateParams,
};
pub use function::{FunctionArg, UserFunctionCreateParams, UserFunctionModel, UserFunctionRepository};
pub use pool::{PgClient, PgConnection};
pub use queries::{Language, ObjectKind, TriggerEvent};
pub use role::RoleRepository;

//! Provider-side plugin surface: typed values, diagnostics, schemas and the
//! lifecycle contracts the host drives.

pub mod diag;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod server;
pub mod types;

pub use diag::{Diagnostic, Diagnostics, Severity};
pub use provider::{ConfigureRequest, ConfigureResponse, Provider};
pub use resource::{
    decode, encode, import_state_passthrough_id, provider_data, CreateRequest, DataSource,
    DataSourceFactory, DeleteRequest, ImportRequest, ProviderData, ReadDataSourceRequest,
    ReadRequest, ReadResponse, Resource, ResourceFactory, StateResponse, UpdateRequest,
};
pub use schema::{Attribute, AttributeKind, PlanModifier, PlannedChange, Schema, Validator};
pub use server::ProviderServer;
pub use types::{Json, Value, UNKNOWN_SENTINEL};

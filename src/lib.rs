pub mod client;
pub mod framework;
pub mod provider;

pub use client::{ClientConfig, ClientError, PgClient, PgConnection};
pub use framework::{Diagnostic, Diagnostics, ProviderServer};
pub use provider::PostgresqlProvider;

/// A server for the PostgreSQL provider, reading fallbacks from the process environment.
pub fn new_server(version: &str) -> ProviderServer<PostgresqlProvider> {
    ProviderServer::new(PostgresqlProvider::new(version))
}

pub mod config_file;
mod database_data_source;
mod docs;
mod event_trigger_data_source;
mod event_trigger_resource;
mod function_resource;
mod helpers;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::client::config::{DEFAULT_MAX_IDLE_CONN, DEFAULT_MAX_OPEN_CONN, DEFAULT_PORT, REDACTED};
use crate::client::{ClientConfig, PgClient, Scheme, SslMode};
use crate::framework::{
    decode, Attribute, AttributeKind, ConfigureRequest, ConfigureResponse, DataSourceFactory,
    Diagnostics, Provider, ProviderData, ResourceFactory, Schema, Validator, Value,
};

pub use database_data_source::DatabaseDataSource;
pub use event_trigger_data_source::EventTriggerDataSource;
pub use event_trigger_resource::EventTriggerResource;
pub use function_resource::FunctionResource;

pub const TYPE_NAME: &str = "postgresql";

pub const ENV_HOST: &str = "POSTGRES_HOST";
pub const ENV_PORT: &str = "POSTGRES_PORT";
pub const ENV_USER: &str = "POSTGRES_USER";
pub const ENV_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const ENV_DATABASE: &str = "POSTGRES_DATABASE";
pub const ENV_SCHEME: &str = "POSTGRES_SCHEME";
pub const ENV_SSLMODE: &str = "POSTGRES_SSLMODE";
pub const ENV_MAX_OPEN_CONN: &str = "POSTGRES_MAX_OPEN_CONN";
pub const ENV_MAX_IDLE_CONN: &str = "POSTGRES_MAX_IDLE_CONN";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The provider block as written by the user.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfigModel {
    pub host: Value<String>,
    pub port: Value<i64>,
    pub username: Value<String>,
    pub password: Value<String>,
    pub database: Value<String>,
    pub scheme: Value<String>,
    pub sslmode: Value<String>,
    pub max_open_conn: Value<i64>,
    pub max_idle_conn: Value<i64>,
}

impl fmt::Debug for ProviderConfigModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = match &self.password {
            Value::Known(_) => Value::string(REDACTED),
            other => other.clone(),
        };
        f.debug_struct("ProviderConfigModel")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &password)
            .field("database", &self.database)
            .field("scheme", &self.scheme)
            .field("sslmode", &self.sslmode)
            .field("max_open_conn", &self.max_open_conn)
            .field("max_idle_conn", &self.max_idle_conn)
            .finish()
    }
}

pub struct PostgresqlProvider {
    version: String,
    env: EnvLookup,
}

impl PostgresqlProvider {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the process environment as the fallback source.
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Box::new(lookup);
        self
    }

    fn env_var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.is_empty())
    }

    /// Fill every null attribute from the environment, then from defaults.
    pub fn load_config(&self, model: &mut ProviderConfigModel) -> Diagnostics {
        let mut diags = Diagnostics::new();

        let strings = [
            (&mut model.host, ENV_HOST, None),
            (&mut model.username, ENV_USER, None),
            (&mut model.password, ENV_PASSWORD, None),
            (&mut model.database, ENV_DATABASE, None),
            (&mut model.scheme, ENV_SCHEME, Some(Scheme::Postgres.to_string())),
            (&mut model.sslmode, ENV_SSLMODE, Some(SslMode::Require.to_string())),
        ];
        for (value, key, default) in strings {
            if value.is_null() {
                *value = match self.env_var(key) {
                    Some(v) => Value::Known(v),
                    None => Value::Known(default.unwrap_or_default()),
                };
            }
        }

        let ints = [
            (&mut model.port, ENV_PORT, "port", i64::from(DEFAULT_PORT)),
            (&mut model.max_open_conn, ENV_MAX_OPEN_CONN, "max_open_conn", i64::from(DEFAULT_MAX_OPEN_CONN)),
            (&mut model.max_idle_conn, ENV_MAX_IDLE_CONN, "max_idle_conn", i64::from(DEFAULT_MAX_IDLE_CONN)),
        ];
        for (value, key, attr, default) in ints {
            if !value.is_null() {
                continue;
            }
            *value = match self.env_var(key) {
                Some(raw) => match raw.trim().parse::<i64>() {
                    Ok(n) => Value::Known(n),
                    Err(e) => {
                        diags.add_attribute_error(
                            attr,
                            format!("Failed to parse environment variable '{}' to int", key),
                            e.to_string(),
                        );
                        continue;
                    }
                },
                None => Value::Known(default),
            };
        }
        diags
    }

    /// Resolve a provider block into a validated client configuration.
    pub fn client_config(&self, model: &ProviderConfigModel) -> Result<ClientConfig, Diagnostics> {
        let mut model = model.clone();
        let mut diags = Diagnostics::new();

        for (attr, unknown) in [
            ("host", model.host.is_unknown()),
            ("port", model.port.is_unknown()),
            ("username", model.username.is_unknown()),
            ("password", model.password.is_unknown()),
            ("database", model.database.is_unknown()),
            ("scheme", model.scheme.is_unknown()),
            ("sslmode", model.sslmode.is_unknown()),
            ("max_open_conn", model.max_open_conn.is_unknown()),
            ("max_idle_conn", model.max_idle_conn.is_unknown()),
        ] {
            if unknown {
                diags.add_attribute_error(
                    attr,
                    format!("Unknown PostgreSQL {}", attr),
                    format!(
                        "The provider cannot create the PostgreSQL client as there is an unknown configuration value for '{}'. \
                         Either set it statically in the configuration or use the environment.",
                        attr
                    ),
                );
            }
        }
        if diags.has_error() {
            return Err(diags);
        }

        diags.append(self.load_config(&mut model));
        if diags.has_error() {
            return Err(diags);
        }

        let str_of = |v: &Value<String>| v.as_str().unwrap_or_default().to_string();
        let int_of = |v: &Value<i64>| v.as_known().copied().unwrap_or_default();
        ClientConfig::builder()
            .host(str_of(&model.host))
            .port(int_of(&model.port))
            .username(str_of(&model.username))
            .password(str_of(&model.password))
            .database(str_of(&model.database))
            .scheme(str_of(&model.scheme))
            .sslmode(str_of(&model.sslmode))
            .max_open_conn(int_of(&model.max_open_conn))
            .max_idle_conn(int_of(&model.max_idle_conn))
            .build()
            .map_err(|e| {
                diags.add_error("Failed to create Postgres client connection options", e.to_string());
                diags
            })
    }
}

#[async_trait]
impl Provider for PostgresqlProvider {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn schema(&self) -> Schema {
        Schema::new(
            docs::PROVIDER_OVERVIEW,
            vec![
                Attribute::optional("host", AttributeKind::String)
                    .description("The hostname of the PostgreSQL server."),
                Attribute::optional("port", AttributeKind::Int64)
                    .description("The port of the PostgreSQL server. Default is 5432.")
                    .validator(Validator::AtLeast(1)),
                Attribute::optional("username", AttributeKind::String)
                    .description("The username to use when connecting to the PostgreSQL server."),
                Attribute::optional("password", AttributeKind::String)
                    .description("The password to use when connecting to the PostgreSQL server.")
                    .sensitive(),
                Attribute::optional("database", AttributeKind::String)
                    .description("The name of the PostgreSQL database to connect to."),
                Attribute::optional("scheme", AttributeKind::String)
                    .description(docs::SCHEME)
                    .validator(Validator::OneOf(Scheme::ALL.to_vec())),
                Attribute::optional("sslmode", AttributeKind::String)
                    .description(docs::SSLMODE)
                    .validator(Validator::OneOf(SslMode::ALL.to_vec())),
                Attribute::optional("max_open_conn", AttributeKind::Int64)
                    .description("Maximum number of open connections to the database. Default is 0 (unlimited).")
                    .validator(Validator::AtLeast(0)),
                Attribute::optional("max_idle_conn", AttributeKind::Int64)
                    .description("Maximum number of idle connections to the database. Default is 5.")
                    .validator(Validator::AtLeast(0)),
            ],
        )
    }

    async fn configure(&self, req: ConfigureRequest) -> ConfigureResponse {
        trace!("configuring '{}' provider", TYPE_NAME);
        let mut diagnostics = Diagnostics::new();
        let Some(model) = decode::<ProviderConfigModel>(&req.config, "provider configuration", &mut diagnostics) else {
            return ConfigureResponse {
                data: None,
                diagnostics,
            };
        };

        let config = match self.client_config(&model) {
            Ok(config) => config,
            Err(diags) => {
                diagnostics.append(diags);
                return ConfigureResponse {
                    data: None,
                    diagnostics,
                };
            }
        };
        debug!(
            "creating client for {} (host={}, username={}, database={})",
            TYPE_NAME, config.host, config.username, config.database
        );

        let data: ProviderData = Arc::new(PgClient::new(config));
        ConfigureResponse {
            data: Some(data),
            diagnostics,
        }
    }

    fn resources(&self) -> Vec<ResourceFactory> {
        vec![EventTriggerResource::factory, FunctionResource::factory]
    }

    fn data_sources(&self) -> Vec<DataSourceFactory> {
        vec![EventTriggerDataSource::factory, DatabaseDataSource::factory]
    }
}

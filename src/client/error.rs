use thiserror::Error;

/// Operation names attached to query failures.
pub mod op {
    pub const COMMIT_TRANSACTION: &str = "commit_transaction";
    pub const CREATE_COMMENT: &str = "create_comment";
    pub const CREATE_EVENT_TRIGGER: &str = "create_event_trigger";
    pub const CREATE_USER_FUNCTION: &str = "create_user_function";
    pub const DROP_EVENT_TRIGGER: &str = "drop_event_trigger";
    pub const DROP_OBJECT: &str = "drop_object";
    pub const DROP_USER_FUNCTION: &str = "drop_user_function";
    pub const EXECUTE: &str = "execute";
    pub const EXISTS_DATABASE: &str = "exists_database";
    pub const EXISTS_EVENT_TRIGGER: &str = "exists_event_trigger";
    pub const EXISTS_USER_FUNCTION: &str = "exists_user_function";
    pub const GET_DATABASE: &str = "get_database";
    pub const GET_EVENT_TRIGGER: &str = "get_event_trigger";
    pub const GET_USER_FUNCTION: &str = "get_user_function";
    pub const QUERY_ROW: &str = "query_row";
    pub const ROLE_SUPERUSER: &str = "role_superuser";
    pub const SCAN_ROW_RESULT: &str = "scan_row_result";
    pub const START_TRANSACTION: &str = "start_transaction";
    pub const UPDATE_USER_FUNCTION: &str = "update_user_function";
    pub const UPDATE_EVENT_TRIGGER: &str = "update_event_trigger";
}

/// Key/value context collected from a failed database call.
pub type Metadata = Vec<(String, String)>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid {context}: {reason}")]
    Validation {
        context: &'static str,
        reason: String,
    },

    #[error("error connecting to database '{database}'. Error: {message}")]
    Connection { database: String, message: String },

    #[error("error pinging database '{database}'. Error: {message}")]
    Ping { database: String, message: String },

    #[error("error checking out a connection for database '{database}'. Error: {message}")]
    Pool { database: String, message: String },

    #[error("{operation}: {source}")]
    Query {
        operation: &'static str,
        metadata: Metadata,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

impl ClientError {
    pub fn validation(context: &'static str, reason: impl Into<String>) -> Self {
        ClientError::Validation {
            context,
            reason: reason.into(),
        }
    }

    /// Wrap a driver error, extracting the server-side details when present.
    pub fn query(operation: &'static str, err: tokio_postgres::Error) -> Self {
        Self::query_step(operation, None, err)
    }

    pub fn query_step(
        operation: &'static str,
        step: Option<&'static str>,
        err: tokio_postgres::Error,
    ) -> Self {
        let mut metadata = Vec::new();
        if let Some(db) = err.as_db_error() {
            metadata.push(("code".to_string(), db.code().code().to_string()));
            metadata.push(("severity".to_string(), db.severity().to_string()));
            metadata.push(("message".to_string(), db.message().to_string()));
        }
        metadata.push(("operation".to_string(), operation.to_string()));
        if let Some(step) = step {
            metadata.push(("pg_cmd".to_string(), step.to_string()));
        }
        ClientError::Query {
            operation,
            metadata,
            source: err,
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ClientError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    /// SQLSTATE reported by the server, if the failure came from one.
    pub fn code(&self) -> Option<&str> {
        self.metadata_value("code")
    }

    pub fn metadata(&self) -> &[(String, String)] {
        match self {
            ClientError::Query { metadata, .. } => metadata,
            _ => &[],
        }
    }

    fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

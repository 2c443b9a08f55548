use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::diag::Diagnostics;
use super::schema::Schema;
use super::types::Json;

/// Whatever the provider hands its resources after `configure`.
pub type ProviderData = Arc<dyn Any + Send + Sync>;

pub type ResourceFactory = fn() -> Box<dyn Resource>;
pub type DataSourceFactory = fn() -> Box<dyn DataSource>;

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub config: Json,
    pub plan: Json,
}

#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub state: Json,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub config: Json,
    pub plan: Json,
    pub state: Json,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub state: Json,
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub id: String,
}

/// Outcome of create, update and import. A null state means nothing was stored.
#[derive(Debug, Clone, Default)]
pub struct StateResponse {
    pub state: Json,
    pub diagnostics: Diagnostics,
}

/// `state: None` asks the host to forget the resource.
#[derive(Debug, Clone, Default)]
pub struct ReadResponse {
    pub state: Option<Json>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct ReadDataSourceRequest {
    pub config: Json,
}

#[async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn configure(&mut self, _data: Option<&ProviderData>, _diags: &mut Diagnostics) {}

    /// Checks beyond what the schema can express.
    fn validate_config(&self, _config: &Json, _diags: &mut Diagnostics) {}

    async fn create(&self, req: CreateRequest) -> StateResponse;

    async fn read(&self, req: ReadRequest) -> ReadResponse;

    async fn update(&self, req: UpdateRequest) -> StateResponse;

    async fn delete(&self, req: DeleteRequest) -> Diagnostics;

    async fn import_state(&self, _req: ImportRequest) -> StateResponse {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(
            "Resource Import Not Implemented",
            format!("{} does not support import.", self.type_name()),
        );
        StateResponse {
            state: Json::Null,
            diagnostics,
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn configure(&mut self, _data: Option<&ProviderData>, _diags: &mut Diagnostics) {}

    async fn read(&self, req: ReadDataSourceRequest) -> StateResponse;
}

/// Store the request id in the `id` attribute and leave the rest to read.
pub fn import_state_passthrough_id(req: &ImportRequest) -> StateResponse {
    StateResponse {
        state: serde_json::json!({ "id": req.id }),
        diagnostics: Diagnostics::new(),
    }
}

/// Decode a state, plan or config object into a typed model.
pub fn decode<T: DeserializeOwned>(value: &Json, what: &str, diags: &mut Diagnostics) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(model) => Some(model),
        Err(e) => {
            diags.add_error(
                format!("Unable to read {}", what),
                format!("Value conversion error: {}", e),
            );
            None
        }
    }
}

pub fn encode<T: Serialize>(model: &T, diags: &mut Diagnostics) -> Json {
    match serde_json::to_value(model) {
        Ok(v) => v,
        Err(e) => {
            diags.add_error("Unable to encode state", e.to_string());
            Json::Null
        }
    }
}

/// Downcast provider data to the concrete client type, reporting a mismatch.
pub fn provider_data<T: Any + Send + Sync>(
    data: Option<&ProviderData>,
    kind: &str,
    diags: &mut Diagnostics,
) -> Option<Arc<T>> {
    let data = data?;
    match Arc::clone(data).downcast::<T>() {
        Ok(client) => Some(client),
        Err(_) => {
            diags.add_error(
                format!("Unexpected {} Configure Type", kind),
                format!(
                    "Expected {}, got a different type. Please report this issue to the provider developers.",
                    std::any::type_name::<T>()
                ),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_data_downcast() {
        let mut diags = Diagnostics::new();
        let data: ProviderData = Arc::new(42u32);
        assert_eq!(provider_data::<u32>(Some(&data), "Resource", &mut diags).as_deref(), Some(&42));
        assert!(diags.is_empty());

        assert!(provider_data::<String>(Some(&data), "Resource", &mut diags).is_none());
        assert!(diags.has_error());
    }

    #[test]
    fn absent_provider_data_is_not_an_error() {
        let mut diags = Diagnostics::new();
        assert!(provider_data::<u32>(None, "Data Source", &mut diags).is_none());
        assert!(diags.is_empty());
    }

    #[test]
    fn passthrough_import() {
        let resp = import_state_passthrough_id(&ImportRequest { id: "db.audit".into() });
        assert_eq!(resp.state, serde_json::json!({ "id": "db.audit" }));
    }
}

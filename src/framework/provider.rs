use async_trait::async_trait;

use super::diag::Diagnostics;
use super::resource::{DataSourceFactory, ProviderData, ResourceFactory};
use super::schema::Schema;
use super::types::Json;

#[derive(Debug, Clone)]
pub struct ConfigureRequest {
    pub config: Json,
    pub host_version: String,
}

#[derive(Default)]
pub struct ConfigureResponse {
    /// Shared with every resource and data source.
    pub data: Option<ProviderData>,
    pub diagnostics: Diagnostics,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix of every resource and data source type name.
    fn type_name(&self) -> &'static str;

    fn version(&self) -> &str;

    fn schema(&self) -> Schema;

    async fn configure(&self, req: ConfigureRequest) -> ConfigureResponse;

    fn resources(&self) -> Vec<ResourceFactory>;

    fn data_sources(&self) -> Vec<DataSourceFactory>;
}

use std::collections::BTreeMap;

use log::{debug, trace, warn};
use serde::Serialize;

use super::diag::Diagnostics;
use super::provider::{ConfigureRequest, Provider};
use super::resource::{
    CreateRequest, DataSource, DataSourceFactory, DeleteRequest, ImportRequest, ProviderData,
    ReadDataSourceRequest, ReadRequest, Resource, ResourceFactory, UpdateRequest,
};
use super::schema::Schema;
use super::types::{contains_unknown, Json};

#[derive(Debug, Clone, Serialize)]
pub struct GetSchemaResponse {
    pub provider: Schema,
    pub resource_schemas: BTreeMap<String, Schema>,
    pub data_source_schemas: BTreeMap<String, Schema>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResourceChangeResponse {
    pub planned_state: Json,
    pub requires_replace: Vec<String>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResourceChangeResponse {
    pub new_state: Json,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceResponse {
    /// Null when the object no longer exists.
    pub new_state: Json,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedResource {
    pub type_name: String,
    pub state: Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResourceResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadDataSourceResponse {
    pub state: Json,
    pub diagnostics: Diagnostics,
}

/// Dispatches host lifecycle calls to the provider's resources and data sources.
pub struct ProviderServer<P: Provider> {
    provider: P,
    data: Option<ProviderData>,
    resources: BTreeMap<&'static str, ResourceFactory>,
    data_sources: BTreeMap<&'static str, DataSourceFactory>,
}

impl<P: Provider> ProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider
            .resources()
            .into_iter()
            .map(|factory| (factory().type_name(), factory))
            .collect();
        let data_sources = provider
            .data_sources()
            .into_iter()
            .map(|factory| (factory().type_name(), factory))
            .collect();
        Self {
            provider,
            data: None,
            resources,
            data_sources,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_configured(&self) -> bool {
        self.data.is_some()
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_types(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }

    pub fn get_schema(&self) -> GetSchemaResponse {
        GetSchemaResponse {
            provider: self.provider.schema(),
            resource_schemas: self
                .resources
                .iter()
                .map(|(name, factory)| (name.to_string(), factory().schema()))
                .collect(),
            data_source_schemas: self
                .data_sources
                .iter()
                .map(|(name, factory)| (name.to_string(), factory().schema()))
                .collect(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub async fn configure(&mut self, config: Json) -> Diagnostics {
        let mut diags = self.provider.schema().validate_config(&config);
        if diags.has_error() {
            return diags;
        }
        debug!("configuring provider {} {}", self.provider.type_name(), self.provider.version());
        let resp = self
            .provider
            .configure(ConfigureRequest {
                config,
                host_version: String::new(),
            })
            .await;
        diags.append(resp.diagnostics);
        if !diags.has_error() {
            self.data = resp.data;
        }
        diags
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &Json) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(resource) = self.resource(type_name, &mut diags) else {
            return diags;
        };
        diags.append(resource.schema().validate_config(config));
        if !diags.has_error() {
            resource.validate_config(config, &mut diags);
        }
        diags
    }

    /// `config: None` plans destruction.
    pub fn plan_resource_change(
        &self,
        type_name: &str,
        prior_state: Option<&Json>,
        config: Option<&Json>,
    ) -> PlanResourceChangeResponse {
        let mut diags = Diagnostics::new();
        let Some(config) = config.filter(|c| !c.is_null()) else {
            return PlanResourceChangeResponse {
                planned_state: Json::Null,
                requires_replace: Vec::new(),
                diagnostics: diags,
            };
        };
        let Some(resource) = self.resource(type_name, &mut diags) else {
            return PlanResourceChangeResponse {
                planned_state: Json::Null,
                requires_replace: Vec::new(),
                diagnostics: diags,
            };
        };
        let schema = resource.schema();
        diags.append(schema.validate_config(config));
        if diags.has_error() {
            return PlanResourceChangeResponse {
                planned_state: Json::Null,
                requires_replace: Vec::new(),
                diagnostics: diags,
            };
        }
        resource.validate_config(config, &mut diags);
        let planned = schema.plan(prior_state, config);
        trace!(
            "planned {}: replace={:?}",
            type_name,
            planned.requires_replace
        );
        PlanResourceChangeResponse {
            planned_state: planned.planned_state,
            requires_replace: planned.requires_replace,
            diagnostics: diags,
        }
    }

    /// Create, update or delete depending on which of prior and planned state are null.
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior_state: Option<&Json>,
        planned_state: Option<&Json>,
        config: Option<&Json>,
    ) -> ApplyResourceChangeResponse {
        let mut diags = Diagnostics::new();
        let Some(resource) = self.configured_resource(type_name, &mut diags) else {
            return ApplyResourceChangeResponse {
                new_state: prior_state.cloned().unwrap_or(Json::Null),
                diagnostics: diags,
            };
        };
        let prior = prior_state.filter(|s| !s.is_null()).cloned();
        let planned = planned_state.filter(|s| !s.is_null()).cloned();
        let config = config.cloned().unwrap_or(Json::Null);

        let (new_state, resp_diags) = match (prior, planned) {
            (None, None) => (Json::Null, Diagnostics::new()),
            (Some(state), None) => {
                debug!("deleting {}", type_name);
                let d = resource.delete(DeleteRequest { state: state.clone() }).await;
                let new_state = if d.has_error() { state } else { Json::Null };
                (new_state, d)
            }
            (None, Some(plan)) => {
                debug!("creating {}", type_name);
                let resp = resource.create(CreateRequest { config, plan }).await;
                (resp.state, resp.diagnostics)
            }
            (Some(state), Some(plan)) => {
                debug!("updating {}", type_name);
                let resp = resource.update(UpdateRequest { config, plan, state }).await;
                (resp.state, resp.diagnostics)
            }
        };
        diags.append(resp_diags);

        if contains_unknown(&new_state) {
            warn!("{} returned unknown values after apply", type_name);
            diags.add_error(
                "Provider returned invalid result object after apply",
                format!("After the apply operation, {} still contains unknown values.", type_name),
            );
        }
        ApplyResourceChangeResponse {
            new_state,
            diagnostics: diags,
        }
    }

    pub async fn read_resource(&self, type_name: &str, current_state: &Json) -> ReadResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(resource) = self.configured_resource(type_name, &mut diags) else {
            return ReadResourceResponse {
                new_state: current_state.clone(),
                diagnostics: diags,
            };
        };
        let resp = resource
            .read(ReadRequest {
                state: current_state.clone(),
            })
            .await;
        diags.append(resp.diagnostics);
        ReadResourceResponse {
            new_state: resp.state.unwrap_or(Json::Null),
            diagnostics: diags,
        }
    }

    pub async fn import_resource(&self, type_name: &str, id: &str) -> ImportResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(resource) = self.configured_resource(type_name, &mut diags) else {
            return ImportResourceResponse {
                imported_resources: Vec::new(),
                diagnostics: diags,
            };
        };
        let resp = resource.import_state(ImportRequest { id: id.to_string() }).await;
        diags.append(resp.diagnostics);
        let imported_resources = if diags.has_error() {
            Vec::new()
        } else {
            vec![ImportedResource {
                type_name: type_name.to_string(),
                state: resp.state,
            }]
        };
        ImportResourceResponse {
            imported_resources,
            diagnostics: diags,
        }
    }

    pub async fn read_data_source(&self, type_name: &str, config: &Json) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let Some(data_source) = self.data_source(type_name, &mut diags) else {
            return ReadDataSourceResponse {
                state: Json::Null,
                diagnostics: diags,
            };
        };
        diags.append(data_source.schema().validate_config(config));
        if diags.has_error() {
            return ReadDataSourceResponse {
                state: Json::Null,
                diagnostics: diags,
            };
        }
        let resp = data_source
            .read(ReadDataSourceRequest {
                config: config.clone(),
            })
            .await;
        diags.append(resp.diagnostics);
        ReadDataSourceResponse {
            state: resp.state,
            diagnostics: diags,
        }
    }

    fn resource(&self, type_name: &str, diags: &mut Diagnostics) -> Option<Box<dyn Resource>> {
        match self.resources.get(type_name) {
            Some(factory) => Some(factory()),
            None => {
                diags.add_error(
                    "Unknown resource type",
                    format!("The provider does not support resource type \"{}\".", type_name),
                );
                None
            }
        }
    }

    fn configured_resource(&self, type_name: &str, diags: &mut Diagnostics) -> Option<Box<dyn Resource>> {
        let mut resource = self.resource(type_name, diags)?;
        resource.configure(self.data.as_ref(), diags);
        if diags.has_error() {
            return None;
        }
        Some(resource)
    }

    fn data_source(&self, type_name: &str, diags: &mut Diagnostics) -> Option<Box<dyn DataSource>> {
        let mut data_source = match self.data_sources.get(type_name) {
            Some(factory) => factory(),
            None => {
                diags.add_error(
                    "Unknown data source type",
                    format!("The provider does not support data source type \"{}\".", type_name),
                );
                return None;
            }
        };
        data_source.configure(self.data.as_ref(), diags);
        if diags.has_error() {
            return None;
        }
        Some(data_source)
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::client::{EventTriggerModel, PgClient};
use crate::framework::{
    decode, encode, Attribute, AttributeKind, DataSource, Diagnostics, Json, ProviderData,
    ReadDataSourceRequest, Schema, StateResponse, Value,
};

use super::docs;
use super::helpers::{configure_client, connect, format_id, normalize_comment, require_client};

pub const TYPE_NAME: &str = "postgresql_event_trigger";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTriggerDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub database: Value<String>,
    pub event: Value<String>,
    pub tags: Value<Vec<String>>,
    pub exec_func: Value<String>,
    pub enabled: Value<bool>,
    pub owner: Value<String>,
    pub comment: Value<String>,
}

impl From<EventTriggerModel> for EventTriggerDataSourceModel {
    fn from(trigger: EventTriggerModel) -> Self {
        EventTriggerDataSourceModel {
            id: Value::string(format_id(&trigger.database, &trigger.name)),
            name: Value::Known(trigger.name),
            database: Value::Known(trigger.database),
            event: Value::Known(trigger.event),
            tags: Value::Known(trigger.tags),
            exec_func: Value::Known(trigger.exec_func),
            enabled: Value::Known(trigger.enabled),
            owner: Value::Known(trigger.owner),
            comment: normalize_comment(trigger.comment).into(),
        }
    }
}

#[derive(Default)]
pub struct EventTriggerDataSource {
    client: Option<Arc<PgClient>>,
}

impl EventTriggerDataSource {
    pub fn factory() -> Box<dyn DataSource> {
        Box::new(Self::default())
    }

    async fn read_model(&self, config: &Json, diags: &mut Diagnostics) -> Option<EventTriggerDataSourceModel> {
        let client = require_client(&self.client, TYPE_NAME, diags)?;
        let model: EventTriggerDataSourceModel = decode(config, "configuration", diags)?;
        let name = model.name.as_str().unwrap_or_default();
        let database = model
            .database
            .non_empty()
            .unwrap_or(client.config().database.as_str());

        let conn = connect(client, Some(database), diags).await?;
        match conn.event_triggers().get(name).await {
            Ok(trigger) => Some(trigger.into()),
            Err(e) => {
                diags.add_error(format!("Error reading event_trigger: '{}'", name), e.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl DataSource for EventTriggerDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(
            docs::DATA_SOURCE_EVENT_TRIGGER,
            vec![
                Attribute::computed("id", AttributeKind::String)
                    .description("The identifier of the event trigger, in the format `database_name.event_trigger_name`."),
                Attribute::required("name", AttributeKind::String)
                    .description("Name of the event trigger."),
                Attribute::optional_computed("database", AttributeKind::String)
                    .description("Name of the database where the event trigger is located. Defaults to the provider database."),
                Attribute::computed("event", AttributeKind::String)
                    .description("The event that fires the event trigger."),
                Attribute::computed("tags", AttributeKind::set_of_string())
                    .description("Command tags the event trigger responds to."),
                Attribute::computed("exec_func", AttributeKind::String)
                    .description("The function executed when the event trigger fires."),
                Attribute::computed("enabled", AttributeKind::Bool)
                    .description("Whether the event trigger is enabled."),
                Attribute::computed("owner", AttributeKind::String)
                    .description("The owner of the event trigger."),
                Attribute::computed("comment", AttributeKind::String)
                    .description("Comment associated with the event trigger."),
            ],
        )
    }

    fn configure(&mut self, data: Option<&ProviderData>, diags: &mut Diagnostics) {
        if let Some(client) = configure_client("Data Source", TYPE_NAME, data, diags) {
            self.client = Some(client);
        }
    }

    async fn read(&self, req: ReadDataSourceRequest) -> StateResponse {
        info!("reading '{}' data source", TYPE_NAME);
        let mut diagnostics = Diagnostics::new();
        let state = match self.read_model(&req.config, &mut diagnostics).await {
            Some(model) => encode(&model, &mut diagnostics),
            None => Json::Null,
        };
        StateResponse { state, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_row_maps_to_state() {
        let model: EventTriggerDataSourceModel = EventTriggerModel {
            name: "audit".into(),
            event: "sql_drop".into(),
            tags: vec!["DROP TABLE".into()],
            exec_func: "audit_fn".into(),
            enabled: false,
            database: "app".into(),
            owner: "postgres".into(),
            comment: Some(String::new()),
        }
        .into();
        assert_eq!(model.id, Value::string("app.audit"));
        assert_eq!(model.enabled, Value::Known(false));
        assert!(model.comment.is_null());
    }

    #[test]
    fn only_name_and_database_are_configurable() {
        let schema = EventTriggerDataSource::default().schema();
        let configurable: Vec<_> = schema
            .attributes
            .iter()
            .filter(|a| a.required || a.optional)
            .map(|a| a.name)
            .collect();
        assert_eq!(configurable, vec!["name", "database"]);
    }
}

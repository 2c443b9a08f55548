use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{
    EventTriggerCreateParams, EventTriggerModel, EventTriggerUpdateParams, PgClient, PgConnection,
    TriggerEvent,
};
use crate::framework::{
    decode, encode, import_state_passthrough_id, Attribute, AttributeKind, CreateRequest,
    DeleteRequest, Diagnostics, ImportRequest, Json, PlanModifier, ProviderData, ReadRequest,
    ReadResponse, Resource, Schema, StateResponse, UpdateRequest, Validator, Value,
};

use super::docs;
use super::helpers::{configure_client, connect, format_id, normalize_comment, parse_id, require_client, timestamp};

pub const TYPE_NAME: &str = "postgresql_event_trigger";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTriggerResourceModel {
    pub id: Value<String>,
    pub last_updated: Value<String>,
    pub name: Value<String>,
    pub event: Value<String>,
    pub tags: Value<Vec<String>>,
    pub exec_func: Value<String>,
    pub enabled: Value<bool>,
    pub database: Value<String>,
    pub owner: Value<String>,
    pub comment: Value<String>,
}

impl EventTriggerResourceModel {
    /// Copy what the catalog reports into the model, keeping the user's
    /// spelling where it means the same thing.
    fn apply(&mut self, trigger: &EventTriggerModel) {
        self.name = Value::string(&trigger.name);
        self.event = Value::string(&trigger.event);
        let same_tags = self
            .tags
            .as_known()
            .is_some_and(|tags| same_tags(tags, &trigger.tags));
        if !same_tags && (!trigger.tags.is_empty() || self.tags.is_known()) {
            self.tags = Value::Known(trigger.tags.clone());
        }
        let same_func = self
            .exec_func
            .as_str()
            .is_some_and(|f| same_function(f, &trigger.exec_func));
        if !same_func {
            self.exec_func = Value::string(&trigger.exec_func);
        }
        self.enabled = Value::Known(trigger.enabled);
        self.database = Value::string(&trigger.database);
        self.owner = Value::string(&trigger.owner);
        match normalize_comment(trigger.comment.clone()) {
            Some(comment) => self.comment = Value::Known(comment),
            None if self.comment.as_str() == Some("") => {}
            None => self.comment = Value::Null,
        }
    }

    fn set_id(&mut self) {
        let database = self.database.as_str().unwrap_or_default();
        let name = self.name.as_str().unwrap_or_default();
        self.id = Value::string(format_id(database, name));
    }

    fn set_last_updated(&mut self) {
        self.last_updated = Value::string(timestamp());
    }
}

/// The catalog stores command tags upper-cased.
fn same_tags(configured: &[String], stored: &[String]) -> bool {
    let upper = |tags: &[String]| tags.iter().map(|t| t.to_uppercase()).collect::<HashSet<_>>();
    configured.len() == stored.len() && upper(configured) == upper(stored)
}

/// Functions in `public` are reported unqualified by the catalog.
fn same_function(a: &str, b: &str) -> bool {
    let strip = |f: &str| f.strip_prefix("public.").unwrap_or(f).to_string();
    strip(a) == strip(b)
}

#[derive(Default)]
pub struct EventTriggerResource {
    client: Option<Arc<PgClient>>,
}

impl EventTriggerResource {
    pub fn factory() -> Box<dyn Resource> {
        Box::new(Self::default())
    }

    async fn create_model(&self, req: &CreateRequest, diags: &mut Diagnostics) -> Option<EventTriggerResourceModel> {
        let client = require_client(&self.client, TYPE_NAME, diags)?;
        let mut model: EventTriggerResourceModel = decode(&req.plan, "plan", diags)?;

        let database = match model.database.non_empty() {
            Some(db) => db.to_string(),
            None => client.config().database.clone(),
        };
        model.database = Value::string(&database);
        let conn = connect(client, Some(&database), diags).await?;

        match conn.roles().current_is_superuser().await {
            Ok(true) => {}
            Ok(false) => {
                diags.add_error(
                    "Error creating event_trigger",
                    format!(
                        "Event triggers can only be created by a superuser and role '{}' is not one.",
                        client.config().username
                    ),
                );
                return None;
            }
            Err(e) => {
                diags.add_error("Error creating event_trigger", e.to_string());
                return None;
            }
        }

        let params = EventTriggerCreateParams {
            name: model.name.as_str().unwrap_or_default().to_string(),
            event: model.event.as_str().unwrap_or_default().to_string(),
            exec_func: model.exec_func.as_str().unwrap_or_default().to_string(),
            enabled: model.enabled.value_or(true),
            tags: model.tags.as_known().cloned().unwrap_or_default(),
            owner: model.owner.non_empty().map(str::to_string),
            comment: model.comment.non_empty().map(str::to_string),
        };
        if let Err(e) = conn.event_triggers().create(&params).await {
            diags.add_error("Error creating event_trigger", e.to_string());
            return None;
        }

        read_into(&conn, &params.name, &mut model, diags).await?;
        model.set_id();
        model.set_last_updated();
        Some(model)
    }

    async fn update_model(&self, req: &UpdateRequest, diags: &mut Diagnostics) -> Option<EventTriggerResourceModel> {
        let client = require_client(&self.client, TYPE_NAME, diags)?;
        let state: EventTriggerResourceModel = decode(&req.state, "state", diags)?;
        let mut plan: EventTriggerResourceModel = decode(&req.plan, "plan", diags)?;

        let database = state.database.as_str().unwrap_or_default().to_string();
        let current_name = state.name.as_str().unwrap_or_default().to_string();
        let conn = connect(client, Some(&database), diags).await?;

        let params = update_params(&state, &plan);
        let trigger = if params.is_empty() {
            trace!("no changes to apply to event trigger '{}'", current_name);
            conn.event_triggers().get(&current_name).await
        } else {
            conn.event_triggers().update(&params).await
        };
        let trigger = match trigger {
            Ok(trigger) => trigger,
            Err(e) => {
                diags.add_error("Error updating event_trigger", e.to_string());
                return None;
            }
        };

        plan.apply(&trigger);
        plan.set_id();
        plan.set_last_updated();
        Some(plan)
    }
}

/// Only the aspects that differ between state and plan.
fn update_params(state: &EventTriggerResourceModel, plan: &EventTriggerResourceModel) -> EventTriggerUpdateParams {
    let changed = |planned: Option<&str>, current: Option<&str>| match planned {
        Some(p) if Some(p) != current => Some(p.to_string()),
        _ => None,
    };
    let comment = match (plan.comment.as_str(), state.comment.non_empty()) {
        (Some(p), current) if p != current.unwrap_or_default() => Some(p.to_string()),
        (None, Some(_)) if plan.comment.is_null() => Some(String::new()),
        _ => None,
    };
    EventTriggerUpdateParams {
        name: state.name.as_str().unwrap_or_default().to_string(),
        new_name: changed(plan.name.non_empty(), state.name.as_str()),
        enabled: plan
            .enabled
            .as_known()
            .copied()
            .filter(|e| Some(e) != state.enabled.as_known()),
        owner: changed(plan.owner.non_empty(), state.owner.as_str()),
        comment,
    }
}

/// Load the trigger into `model`, reporting failures as diagnostics.
async fn read_into(
    conn: &PgConnection,
    name: &str,
    model: &mut EventTriggerResourceModel,
    diags: &mut Diagnostics,
) -> Option<()> {
    match conn.event_triggers().get(name).await {
        Ok(trigger) => {
            model.apply(&trigger);
            Some(())
        }
        Err(e) => {
            diags.add_error(format!("Error reading event_trigger: '{}'", name), e.to_string());
            None
        }
    }
}

#[async_trait]
impl Resource for EventTriggerResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(
            docs::RESOURCE_EVENT_TRIGGER,
            vec![
                Attribute::computed("id", AttributeKind::String)
                    .description("The unique identifier for the event trigger, in the format `database_name.event_trigger_name`.")
                    .modifier(PlanModifier::UseStateForUnknown),
                Attribute::computed("last_updated", AttributeKind::String)
                    .description("The timestamp of the last modification of the event trigger."),
                Attribute::required("name", AttributeKind::String)
                    .description("Name of the event trigger."),
                Attribute::optional("comment", AttributeKind::String)
                    .description("Comment associated with the event trigger."),
                Attribute::optional_computed("database", AttributeKind::String)
                    .description("Name of the database where the event trigger is located. If not provided, the database from the provider configuration will be used.")
                    .modifier(PlanModifier::RequiresReplace)
                    .modifier(PlanModifier::UseStateForUnknown),
                Attribute::required("event", AttributeKind::String)
                    .description("The event that will fire the event trigger.")
                    .validator(Validator::OneOf(TriggerEvent::ALL.to_vec()))
                    .modifier(PlanModifier::RequiresReplace),
                Attribute::optional("tags", AttributeKind::set_of_string())
                    .description("Command tags the event trigger will respond to.")
                    .modifier(PlanModifier::RequiresReplace),
                Attribute::required("exec_func", AttributeKind::String)
                    .description("The function that will be executed when the event trigger fires.")
                    .modifier(PlanModifier::RequiresReplace),
                Attribute::optional_computed("enabled", AttributeKind::Bool)
                    .description("Whether the event trigger is enabled.")
                    .default_value(json!(true))
                    .modifier(PlanModifier::UseStateForUnknown),
                Attribute::optional_computed("owner", AttributeKind::String)
                    .description("The owner of the event trigger.")
                    .modifier(PlanModifier::UseStateForUnknown),
            ],
        )
    }

    fn configure(&mut self, data: Option<&ProviderData>, diags: &mut Diagnostics) {
        if let Some(client) = configure_client("Resource", TYPE_NAME, data, diags) {
            self.client = Some(client);
        }
    }

    fn validate_config(&self, config: &Json, diags: &mut Diagnostics) {
        let Some(tags) = config.get("tags").and_then(Json::as_array) else {
            return;
        };
        let mut seen = HashSet::new();
        for tag in tags.iter().filter_map(Json::as_str) {
            if tag.is_empty() {
                diags.add_attribute_error("tags", "Invalid Attribute Value", "Tags must not be empty strings.");
            } else if !seen.insert(tag.to_uppercase()) {
                diags.add_attribute_error("tags", "Duplicate Set Element", format!("Tag '{}' is repeated.", tag));
            }
        }
    }

    async fn create(&self, req: CreateRequest) -> StateResponse {
        trace!("creating '{}' resource", TYPE_NAME);
        let mut diagnostics = Diagnostics::new();
        let state = match self.create_model(&req, &mut diagnostics).await {
            Some(model) => encode(&model, &mut diagnostics),
            None => Json::Null,
        };
        StateResponse { state, diagnostics }
    }

    async fn read(&self, req: ReadRequest) -> ReadResponse {
        trace!("reading '{}' resource", TYPE_NAME);
        let mut diagnostics = Diagnostics::new();
        let keep = |diagnostics: Diagnostics| ReadResponse {
            state: Some(req.state.clone()),
            diagnostics,
        };

        let Some(client) = require_client(&self.client, TYPE_NAME, &mut diagnostics) else {
            return keep(diagnostics);
        };
        let Some(mut model) = decode::<EventTriggerResourceModel>(&req.state, "state", &mut diagnostics) else {
            return keep(diagnostics);
        };
        let Some(id) = model.id.as_str().map(str::to_string) else {
            diagnostics.add_error(
                "Missing Identifier for the event trigger",
                "Id is required for reading event trigger",
            );
            return keep(diagnostics);
        };
        let Some((database, name)) = parse_id(&id) else {
            diagnostics.add_error(
                "Invalid Identifier for the event trigger",
                "Id should be in the format 'database_name.event_trigger_name'",
            );
            return keep(diagnostics);
        };

        let Some(conn) = connect(client, Some(database), &mut diagnostics).await else {
            return keep(diagnostics);
        };
        match conn.event_triggers().get(name).await {
            Ok(trigger) => model.apply(&trigger),
            Err(e) if e.is_not_found() => {
                warn!("event trigger '{}' no longer exists, removing it from state", id);
                return ReadResponse {
                    state: None,
                    diagnostics,
                };
            }
            Err(e) => {
                diagnostics.add_error(format!("Error reading event_trigger: '{}'", name), e.to_string());
                return keep(diagnostics);
            }
        }
        model.set_id();

        let state = encode(&model, &mut diagnostics);
        ReadResponse {
            state: Some(state),
            diagnostics,
        }
    }

    async fn update(&self, req: UpdateRequest) -> StateResponse {
        trace!("updating '{}' resource", TYPE_NAME);
        let mut diagnostics = Diagnostics::new();
        let state = match self.update_model(&req, &mut diagnostics).await {
            Some(model) => encode(&model, &mut diagnostics),
            None => req.state.clone(),
        };
        StateResponse { state, diagnostics }
    }

    async fn delete(&self, req: DeleteRequest) -> Diagnostics {
        trace!("deleting '{}' resource", TYPE_NAME);
        let mut diags = Diagnostics::new();
        let Some(client) = require_client(&self.client, TYPE_NAME, &mut diags) else {
            return diags;
        };
        let Some(model) = decode::<EventTriggerResourceModel>(&req.state, "state", &mut diags) else {
            return diags;
        };
        let Some(conn) = connect(client, model.database.non_empty(), &mut diags).await else {
            return diags;
        };
        if let Err(e) = conn.event_triggers().drop(model.name.as_str().unwrap_or_default()).await {
            diags.add_error("Error deleting event_trigger", e.to_string());
        }
        diags
    }

    async fn import_state(&self, req: ImportRequest) -> StateResponse {
        import_state_passthrough_id(&req)
    }
}

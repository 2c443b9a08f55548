use std::sync::Arc;

use async_trait::async_trait;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::client::{FunctionArg, Language, PgClient, UserFunctionCreateParams, UserFunctionModel};
use crate::framework::{
    decode, encode, import_state_passthrough_id, Attribute, AttributeKind, CreateRequest,
    DeleteRequest, Diagnostics, ImportRequest, Json, PlanModifier, ProviderData, ReadRequest,
    ReadResponse, Resource, Schema, StateResponse, UpdateRequest, Validator, Value,
};

use super::docs;
use super::helpers::{configure_client, connect, format_id, normalize_comment, require_client, timestamp};

pub const TYPE_NAME: &str = "postgresql_function";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionResourceModel {
    pub id: Value<String>,
    pub last_updated: Value<String>,
    pub name: Value<String>,
    pub database: Value<String>,
    pub args: Value<Vec<FunctionArg>>,
    pub returns: Value<String>,
    pub language: Value<String>,
    pub body: Value<String>,
    pub owner: Value<String>,
    pub comment: Value<String>,
}

impl FunctionResourceModel {
    /// The catalog prints types in canonical form (`int4` as `integer` and so
    /// on), so configured signatures are kept once the function exists.
    fn apply(&mut self, function: &UserFunctionModel) {
        if self.name.is_unset() {
            self.name = Value::string(&function.name);
        }
        let same_arity = self
            .args
            .as_known()
            .is_some_and(|args| args.len() == function.args.len());
        if !same_arity && !(function.args.is_empty() && self.args.is_null()) {
            self.args = Value::Known(function.args.clone());
        }
        if self.returns.is_unset() {
            self.returns = Value::string(&function.returns);
        }
        let same_language = self
            .language
            .as_str()
            .is_some_and(|l| l.eq_ignore_ascii_case(&function.language));
        if !same_language {
            self.language = Value::string(&function.language);
        }
        self.body = Value::string(&function.body);
        self.database = Value::string(&function.database);
        self.owner = Value::string(&function.owner);
        match normalize_comment(function.comment.clone()) {
            Some(comment) => self.comment = Value::Known(comment),
            None if self.comment.as_str() == Some("") => {}
            None => self.comment = Value::Null,
        }
    }

    fn create_params(&self, replace: bool) -> UserFunctionCreateParams {
        UserFunctionCreateParams {
            name: self.name.as_str().unwrap_or_default().to_string(),
            args: self.args.as_known().cloned().unwrap_or_default(),
            returns: self.returns.as_str().unwrap_or_default().to_string(),
            language: self.language.as_str().unwrap_or_default().to_string(),
            body: self.body.as_str().unwrap_or_default().to_string(),
            replace,
            owner: self.owner.non_empty().map(str::to_string),
            comment: self.comment.as_str().map(str::to_string),
        }
    }

    fn set_id(&mut self) {
        let database = self.database.as_str().unwrap_or_default();
        let name = self.name.as_str().unwrap_or_default();
        self.id = Value::string(format_id(database, name));
    }
}

/// `database.name`, where the name itself may be schema-qualified.
fn parse_function_id(id: &str) -> Option<(&str, &str)> {
    id.split_once('.')
        .filter(|(database, name)| !database.is_empty() && !name.is_empty())
}

#[derive(Default)]
pub struct FunctionResource {
    client: Option<Arc<PgClient>>,
}

impl FunctionResource {
    pub fn factory() -> Box<dyn Resource> {
        Box::new(Self::default())
    }

    async fn create_model(&self, req: &CreateRequest, diags: &mut Diagnostics) -> Option<FunctionResourceModel> {
        let client = require_client(&self.client, TYPE_NAME, diags)?;
        let mut model: FunctionResourceModel = decode(&req.plan, "plan", diags)?;

        let database = match model.database.non_empty() {
            Some(db) => db.to_string(),
            None => client.config().database.clone(),
        };
        let conn = connect(client, Some(&database), diags).await?;

        let params = model.create_params(false);
        let functions = conn.functions();
        if let Err(e) = functions.create(&params).await {
            diags.add_error("Error creating function", e.to_string());
            return None;
        }
        match functions.get(&params.name).await {
            Ok(function) => model.apply(&function),
            Err(e) => {
                diags.add_error(format!("Error reading function: '{}'", params.name), e.to_string());
                return None;
            }
        }
        model.set_id();
        model.last_updated = Value::string(timestamp());
        Some(model)
    }

    async fn update_model(&self, req: &UpdateRequest, diags: &mut Diagnostics) -> Option<FunctionResourceModel> {
        let client = require_client(&self.client, TYPE_NAME, diags)?;
        let state: FunctionResourceModel = decode(&req.state, "state", diags)?;
        let mut plan: FunctionResourceModel = decode(&req.plan, "plan", diags)?;

        let conn = connect(client, state.database.non_empty(), diags).await?;
        let mut params = plan.create_params(true);
        if params.comment.is_none() && state.comment.non_empty().is_some() {
            params.comment = Some(String::new());
        }
        let functions = conn.functions();
        if let Err(e) = functions.create(&params).await {
            diags.add_error("Error updating function", e.to_string());
            return None;
        }
        match functions.get(&params.name).await {
            Ok(function) => plan.apply(&function),
            Err(e) => {
                diags.add_error(format!("Error reading function: '{}'", params.name), e.to_string());
                return None;
            }
        }
        plan.set_id();
        plan.last_updated = Value::string(timestamp());
        Some(plan)
    }
}

#[async_trait]
impl Resource for FunctionResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let arg = AttributeKind::Object(vec![("name", AttributeKind::String), ("type", AttributeKind::String)]);
        Schema::new(
            docs::RESOURCE_FUNCTION,
            vec![
                Attribute::computed("id", AttributeKind::String)
                    .description("The identifier of the function, in the format `database_name.function_name`.")
                    .modifier(PlanModifier::UseStateForUnknown),
                Attribute::computed("last_updated", AttributeKind::String)
                    .description("The timestamp of the last modification of the function."),
                Attribute::required("name", AttributeKind::String)
                    .description("Name of the function, optionally qualified with its schema. Unqualified names live in `public`.")
                    .modifier(PlanModifier::RequiresReplace),
                Attribute::optional_computed("database", AttributeKind::String)
                    .description("Database the function lives in. Defaults to the provider database.")
                    .modifier(PlanModifier::RequiresReplace)
                    .modifier(PlanModifier::UseStateForUnknown),
                Attribute::optional("args", AttributeKind::List(Box::new(arg)))
                    .description("Ordered arguments, each with a `name` and a `type`.")
                    .modifier(PlanModifier::RequiresReplace),
                Attribute::required("returns", AttributeKind::String)
                    .description("Return type of the function.")
                    .modifier(PlanModifier::RequiresReplace),
                Attribute::required("language", AttributeKind::String)
                    .description("Language the body is written in.")
                    .validator(Validator::OneOf(Language::ALL.to_vec())),
                Attribute::required("body", AttributeKind::String)
                    .description("Source of the function body, without dollar quoting."),
                Attribute::optional_computed("owner", AttributeKind::String)
                    .description("The owner of the function.")
                    .modifier(PlanModifier::UseStateForUnknown),
                Attribute::optional("comment", AttributeKind::String)
                    .description("Comment associated with the function."),
            ],
        )
    }

    fn configure(&mut self, data: Option<&ProviderData>, diags: &mut Diagnostics) {
        if let Some(client) = configure_client("Resource", TYPE_NAME, data, diags) {
            self.client = Some(client);
        }
    }

    fn validate_config(&self, config: &Json, diags: &mut Diagnostics) {
        let Ok(model) = serde_json::from_value::<FunctionResourceModel>(config.clone()) else {
            return;
        };
        if model.name.is_unknown() || model.args.is_unknown() || model.returns.is_unknown() || model.body.is_unknown() {
            return;
        }
        let params = model.create_params(false);
        if !params.language.is_empty() {
            if let Err(e) = params.validate() {
                diags.add_error("Invalid function definition", e.to_string());
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
        let Some(mut model) = decode::<FunctionResourceModel>(&req.state, "state", &mut diagnostics) else {
            return keep(diagnostics);
        };
        let id = model.id.as_str().unwrap_or_default().to_string();
        let Some((database, name)) = parse_function_id(&id) else {
            diagnostics.add_error(
                "Invalid Identifier for the function",
                "Id should be in the format 'database_name.function_name'",
            );
            return keep(diagnostics);
        };

        let Some(conn) = connect(client, Some(database), &mut diagnostics).await else {
            return keep(diagnostics);
        };
        match conn.functions().get(name).await {
            Ok(function) => model.apply(&function),
            Err(e) if e.is_not_found() => {
                warn!("function '{}' no longer exists, removing it from state", id);
                return ReadResponse {
                    state: None,
                    diagnostics,
                };
            }
            Err(e) => {
                diagnostics.add_error(format!("Error reading function: '{}'", name), e.to_string());
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
        let Some(model) = decode::<FunctionResourceModel>(&req.state, "state", &mut diags) else {
            return diags;
        };
        let Some(conn) = connect(client, model.database.non_empty(), &mut diags).await else {
            return diags;
        };
        let args = model.args.as_known().cloned().unwrap_or_default();
        if let Err(e) = conn.functions().drop(model.name.as_str().unwrap_or_default(), &args).await {
            diags.add_error("Error deleting function", e.to_string());
        }
        diags
    }

    async fn import_state(&self, req: ImportRequest) -> StateResponse {
        import_state_passthrough_id(&req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> UserFunctionModel {
        UserFunctionModel {
            name: "add".into(),
            args: vec![FunctionArg::new("a", "integer"), FunctionArg::new("b", "integer")],
            returns: "integer".into(),
            language: "sql".into(),
            body: "SELECT a + b".into(),
            database: "app".into(),
            owner: "postgres".into(),
            comment: None,
        }
    }

    #[test]
    fn apply_keeps_configured_signature() {
        let mut model = FunctionResourceModel {
            name: Value::string("add"),
            args: Value::Known(vec![FunctionArg::new("a", "int4"), FunctionArg::new("b", "int4")]),
            returns: Value::string("int4"),
            language: Value::string("SQL"),
            ..Default::default()
        };
        model.apply(&catalog());
        assert_eq!(model.args.as_known().unwrap()[0].r#type, "int4");
        assert_eq!(model.returns, Value::string("int4"));
        assert_eq!(model.language, Value::string("SQL"));
        assert_eq!(model.owner, Value::string("postgres"));
        model.set_id();
        assert_eq!(model.id, Value::string("app.add"));
    }

    #[test]
    fn apply_fills_imported_state() {
        let mut model = FunctionResourceModel {
            id: Value::string("app.add"),
            ..Default::default()
        };
        model.apply(&catalog());
        assert_eq!(model.name, Value::string("add"));
        assert_eq!(model.args.as_known().map(Vec::len), Some(2));
        assert_eq!(model.returns, Value::string("integer"));
        assert_eq!(model.body, Value::string("SELECT a + b"));
    }

    #[test]
    fn function_ids_allow_qualified_names() {
        assert_eq!(parse_function_id("app.audit.add"), Some(("app", "audit.add")));
        assert_eq!(parse_function_id("app."), None);
        assert_eq!(parse_function_id("add"), None);
    }

    #[test]
    fn invalid_definition_is_reported_at_validation() {
        let mut diags = Diagnostics::new();
        let config = json!({
            "name": "add",
            "args": [{ "name": "a", "type": "integer; DROP TABLE x" }],
            "returns": "integer",
            "language": "sql",
            "body": "SELECT 1",
        });
        FunctionResource::default().validate_config(&config, &mut diags);
        assert!(diags.has_error());
    }

    #[test]
    fn body_and_language_change_in_place() {
        let schema = FunctionResource::default().schema();
        for name in ["body", "language", "owner", "comment"] {
            let attr = schema.attribute(name).unwrap();
            assert!(!attr.plan_modifiers.contains(&PlanModifier::RequiresReplace), "{}", name);
        }
        let prior = json!({
            "id": "app.add", "last_updated": "x", "name": "add", "database": "app",
            "args": null, "returns": "integer", "language": "sql", "body": "SELECT 1",
            "owner": "postgres", "comment": null,
        });
        let config = json!({ "name": "add", "returns": "integer", "language": "sql", "body": "SELECT 2" });
        let planned = schema.plan(Some(&prior), &config);
        assert!(planned.requires_replace.is_empty());

        let config = json!({ "name": "add", "returns": "bigint", "language": "sql", "body": "SELECT 1" });
        let planned = schema.plan(Some(&prior), &config);
        assert_eq!(planned.requires_replace, vec!["returns".to_string()]);
    }
}

use std::collections::HashMap;

use serde_json::{json, Value as Json};
use tf_postgresql::framework::UNKNOWN_SENTINEL;
use tf_postgresql::{PostgresqlProvider, ProviderServer};

fn server_with_env(vars: &[(&str, &str)]) -> ProviderServer<PostgresqlProvider> {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ProviderServer::new(PostgresqlProvider::new("test").with_env_lookup(move |key| env.get(key).cloned()))
}

fn trigger_state() -> Json {
    json!({
        "id": "app.audit",
        "last_updated": "Monday, 02-Jan-26 15:04:05 UTC",
        "name": "audit",
        "comment": null,
        "database": "app",
        "event": "ddl_command_end",
        "tags": ["CREATE TABLE"],
        "exec_func": "audit_fn",
        "enabled": true,
        "owner": "postgres",
    })
}

#[test]
fn schema_lists_every_type() {
    let server = server_with_env(&[]);
    assert_eq!(
        server.resource_types(),
        vec!["postgresql_event_trigger", "postgresql_function"]
    );
    assert_eq!(
        server.data_source_types(),
        vec!["postgresql_database", "postgresql_event_trigger"]
    );

    let schema = server.get_schema();
    let password = schema.provider.attribute("password").unwrap();
    assert!(password.sensitive);
    assert!(schema.resource_schemas.contains_key("postgresql_function"));
}

#[test]
fn validate_rejects_bad_configuration() {
    let server = server_with_env(&[]);
    let diags = server.validate_resource_config(
        "postgresql_event_trigger",
        &json!({ "name": "audit", "event": "table_rewrite_all", "exec_func": "f" }),
    );
    assert!(diags.has_error());

    let diags = server.validate_resource_config(
        "postgresql_event_trigger",
        &json!({ "event": "sql_drop", "exec_func": "f" }),
    );
    assert!(diags.has_error());

    let diags = server.validate_resource_config(
        "postgresql_event_trigger",
        &json!({ "name": "audit", "event": "sql_drop", "exec_func": "f", "id": "x.y" }),
    );
    assert!(diags.has_error());

    let diags = server.validate_resource_config(
        "postgresql_event_trigger",
        &json!({ "name": "audit", "event": "sql_drop", "exec_func": "f", "tags": ["DROP TABLE"] }),
    );
    assert!(!diags.has_error(), "{:?}", diags);
}

#[test]
fn plan_new_event_trigger() {
    let server = server_with_env(&[]);
    let plan = server.plan_resource_change(
        "postgresql_event_trigger",
        None,
        Some(&json!({ "name": "audit", "event": "ddl_command_end", "exec_func": "audit_fn" })),
    );
    assert!(!plan.diagnostics.has_error());
    assert!(plan.requires_replace.is_empty());
    let planned = plan.planned_state;
    assert_eq!(planned["enabled"], json!(true));
    assert_eq!(planned["id"], json!(UNKNOWN_SENTINEL));
    assert_eq!(planned["owner"], json!(UNKNOWN_SENTINEL));
    assert_eq!(planned["database"], json!(UNKNOWN_SENTINEL));
    assert_eq!(planned["tags"], Json::Null);
}

#[test]
fn plan_rename_updates_in_place() {
    let server = server_with_env(&[]);
    let config = json!({
        "name": "audit_v2",
        "event": "ddl_command_end",
        "exec_func": "audit_fn",
        "tags": ["CREATE TABLE"],
    });
    let plan = server.plan_resource_change("postgresql_event_trigger", Some(&trigger_state()), Some(&config));
    assert!(plan.requires_replace.is_empty());
    assert_eq!(plan.planned_state["id"], json!("app.audit"));
    assert_eq!(plan.planned_state["owner"], json!("postgres"));
    assert_eq!(plan.planned_state["last_updated"], json!(UNKNOWN_SENTINEL));
}

#[test]
fn plan_event_change_requires_replace() {
    let server = server_with_env(&[]);
    let config = json!({
        "name": "audit",
        "event": "sql_drop",
        "exec_func": "audit_fn",
        "tags": ["CREATE TABLE"],
    });
    let plan = server.plan_resource_change("postgresql_event_trigger", Some(&trigger_state()), Some(&config));
    assert_eq!(plan.requires_replace, vec!["event".to_string()]);
    assert_eq!(plan.planned_state["id"], json!(UNKNOWN_SENTINEL));
}

#[test]
fn plan_destroy_is_null() {
    let server = server_with_env(&[]);
    let plan = server.plan_resource_change("postgresql_event_trigger", Some(&trigger_state()), None);
    assert!(plan.planned_state.is_null());
    assert!(plan.diagnostics.is_empty());
}

#[tokio::test]
async fn configure_from_environment() {
    let mut server = server_with_env(&[
        ("POSTGRES_HOST", "localhost"),
        ("POSTGRES_USER", "postgres"),
        ("POSTGRES_PASSWORD", "secret"),
        ("POSTGRES_DATABASE", "postgres"),
        ("POSTGRES_SSLMODE", "disable"),
    ]);
    let diags = server.configure(json!({ "max_idle_conn": 2 })).await;
    assert!(!diags.has_error(), "{:?}", diags);
    assert!(server.is_configured());
}

#[tokio::test]
async fn configure_reports_bad_environment() {
    let mut server = server_with_env(&[
        ("POSTGRES_HOST", "localhost"),
        ("POSTGRES_PORT", "five"),
    ]);
    let diags = server.configure(json!({})).await;
    assert!(diags.has_error());
    assert!(diags
        .iter()
        .any(|d| d.summary.contains("POSTGRES_PORT") && d.attribute.as_deref() == Some("port")));
    assert!(!server.is_configured());
}

#[tokio::test]
async fn configure_rejects_invalid_sslmode() {
    let mut server = server_with_env(&[]);
    let diags = server.configure(json!({ "sslmode": "prefer" })).await;
    assert!(diags.has_error());
}

#[tokio::test]
async fn apply_before_configure_fails() {
    let server = server_with_env(&[]);
    let planned = server
        .plan_resource_change(
            "postgresql_event_trigger",
            None,
            Some(&json!({ "name": "audit", "event": "sql_drop", "exec_func": "f" })),
        )
        .planned_state;
    let resp = server
        .apply_resource_change("postgresql_event_trigger", None, Some(&planned), None)
        .await;
    assert!(resp.diagnostics.has_error());
    assert!(resp.new_state.is_null());
}

#[tokio::test]
async fn import_passes_the_id_through() {
    let server = server_with_env(&[]);
    let resp = server.import_resource("postgresql_event_trigger", "app.audit").await;
    assert!(!resp.diagnostics.has_error());
    assert_eq!(resp.imported_resources.len(), 1);
    assert_eq!(resp.imported_resources[0].state, json!({ "id": "app.audit" }));
}

#[tokio::test]
async fn unknown_types_are_reported() {
    let server = server_with_env(&[]);
    let resp = server.read_data_source("postgresql_schema", &json!({})).await;
    assert!(resp.diagnostics.has_error());
    let diags = server.validate_resource_config("postgresql_role", &json!({}));
    assert!(diags.has_error());
}

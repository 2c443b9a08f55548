use std::collections::HashSet;

use deadpool_postgres::Transaction;
use log::info;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::error::{op, ClientError, Result};
use super::queries::{self, CreateEventTrigger, ObjectRef, TriggerEvent};
use super::tx;
use super::PgConnection;

const CONTEXT: &str = "event trigger parameters";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTriggerModel {
    pub name: String,
    pub event: String,
    pub tags: Vec<String>,
    pub exec_func: String,
    pub enabled: bool,
    pub database: String,
    pub owner: String,
    pub comment: Option<String>,
}

impl EventTriggerModel {
    fn from_row(row: &Row) -> Result<Self> {
        let scan = |e| ClientError::query_step(op::GET_EVENT_TRIGGER, Some(op::SCAN_ROW_RESULT), e);
        let enabled: String = row.try_get("enabled").map_err(scan)?;
        Ok(EventTriggerModel {
            name: row.try_get("name").map_err(scan)?,
            event: row.try_get("event").map_err(scan)?,
            tags: row
                .try_get::<_, Option<Vec<String>>>("tags")
                .map_err(scan)?
                .unwrap_or_default(),
            exec_func: row
                .try_get::<_, Option<String>>("exec_func")
                .map_err(scan)?
                .unwrap_or_default(),
            // O: origin and local, R: replica, A: always, D: disabled
            enabled: enabled != "D",
            database: row.try_get("database").map_err(scan)?,
            owner: row.try_get("owner").map_err(scan)?,
            comment: row.try_get("comment").map_err(scan)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventTriggerCreateParams {
    pub name: String,
    pub event: String,
    pub exec_func: String,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub owner: Option<String>,
    pub comment: Option<String>,
}

impl EventTriggerCreateParams {
    pub fn validate(&self) -> Result<TriggerEvent> {
        if self.name.is_empty() {
            return Err(ClientError::validation(CONTEXT, "name is required"));
        }
        if self.exec_func.is_empty() {
            return Err(ClientError::validation(CONTEXT, "exec_func is required"));
        }
        let mut seen = HashSet::new();
        for tag in &self.tags {
            if tag.is_empty() {
                return Err(ClientError::validation(CONTEXT, "tags must not be empty"));
            }
            if !seen.insert(tag.as_str()) {
                return Err(ClientError::validation(
                    CONTEXT,
                    format!("tags must be unique, '{}' is repeated", tag),
                ));
            }
        }
        if matches!(self.owner.as_deref(), Some("")) {
            return Err(ClientError::validation(CONTEXT, "owner must not be empty"));
        }
        self.event.parse()
    }
}

/// Changes to apply to an existing event trigger. An empty `comment` clears it.
#[derive(Debug, Clone, Default)]
pub struct EventTriggerUpdateParams {
    pub name: String,
    pub new_name: Option<String>,
    pub enabled: Option<bool>,
    pub owner: Option<String>,
    pub comment: Option<String>,
}

impl EventTriggerUpdateParams {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ClientError::validation(CONTEXT, "name is required"));
        }
        if self.is_empty() {
            return Err(ClientError::validation(
                CONTEXT,
                "at least one of new_name, enabled, owner or comment must be set",
            ));
        }
        if matches!(self.new_name.as_deref(), Some("")) {
            return Err(ClientError::validation(CONTEXT, "new_name must not be empty"));
        }
        if matches!(self.owner.as_deref(), Some("")) {
            return Err(ClientError::validation(CONTEXT, "owner must not be empty"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.enabled.is_none() && self.owner.is_none() && self.comment.is_none()
    }
}

pub struct EventTriggerRepository {
    conn: PgConnection,
}

impl EventTriggerRepository {
    pub(crate) fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, params: &EventTriggerCreateParams) -> Result<()> {
        let event = params.validate()?;
        let mut client = self.conn.client().await?;
        let txn = tx::begin(&mut client, op::CREATE_EVENT_TRIGGER).await?;
        let result = apply_create(&txn, params, event).await;
        tx::finish(txn, op::CREATE_EVENT_TRIGGER, result).await?;
        info!("event trigger '{}' created", params.name);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<EventTriggerModel> {
        let client = self.conn.client().await?;
        let row = client
            .query_opt(queries::event_trigger_info(name).as_str(), &[])
            .await
            .map_err(|e| ClientError::query_step(op::GET_EVENT_TRIGGER, Some(op::QUERY_ROW), e))?
            .ok_or_else(|| ClientError::not_found("event trigger", name))?;
        EventTriggerModel::from_row(&row)
    }

    /// Apply the requested changes and return the object as stored afterwards.
    pub async fn update(&self, params: &EventTriggerUpdateParams) -> Result<EventTriggerModel> {
        params.validate()?;
        let mut client = self.conn.client().await?;
        let txn = tx::begin(&mut client, op::UPDATE_EVENT_TRIGGER).await?;
        let result = apply_update(&txn, params).await;
        let current = tx::finish(txn, op::UPDATE_EVENT_TRIGGER, result).await?;
        drop(client);
        info!("event trigger '{}' updated", current);
        self.get(&current).await
    }

    pub async fn drop(&self, name: &str) -> Result<()> {
        let mut client = self.conn.client().await?;
        let txn = tx::begin(&mut client, op::DROP_EVENT_TRIGGER).await?;
        let sql = queries::drop_object(&ObjectRef::EventTrigger(name));
        let result = tx::execute(&txn, op::DROP_EVENT_TRIGGER, op::DROP_OBJECT, &sql)
            .await
            .map(|_| ());
        tx::finish(txn, op::DROP_EVENT_TRIGGER, result).await?;
        info!("event trigger '{}' dropped", name);
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let client = self.conn.client().await?;
        let row = client
            .query_one(queries::event_trigger_exists(name).as_str(), &[])
            .await
            .map_err(|e| ClientError::query_step(op::EXISTS_EVENT_TRIGGER, Some(op::QUERY_ROW), e))?;
        row.try_get(0)
            .map_err(|e| ClientError::query_step(op::EXISTS_EVENT_TRIGGER, Some(op::SCAN_ROW_RESULT), e))
    }
}

async fn apply_create(
    txn: &Transaction<'_>,
    params: &EventTriggerCreateParams,
    event: TriggerEvent,
) -> Result<()> {
    let operation = op::CREATE_EVENT_TRIGGER;
    let create = CreateEventTrigger {
        name: &params.name,
        event,
        tags: &params.tags,
        exec_func: &params.exec_func,
    };
    tx::execute(txn, operation, op::EXECUTE, &create.to_string()).await?;

    let object = ObjectRef::EventTrigger(&params.name);
    if let Some(owner) = &params.owner {
        tx::execute(txn, operation, op::EXECUTE, &queries::alter_object_owner(&object, owner)).await?;
    }
    if let Some(comment) = &params.comment {
        let sql = queries::comment_on(&object, Some(comment));
        tx::execute(txn, operation, op::CREATE_COMMENT, &sql).await?;
    }
    if !params.enabled {
        let sql = queries::alter_event_trigger_enabled(&params.name, false);
        tx::execute(txn, operation, op::EXECUTE, &sql).await?;
    }
    Ok(())
}

/// Returns the trigger's name after the update.
async fn apply_update(txn: &Transaction<'_>, params: &EventTriggerUpdateParams) -> Result<String> {
    let operation = op::UPDATE_EVENT_TRIGGER;
    let mut current = params.name.clone();

    if let Some(new_name) = &params.new_name {
        if *new_name != current {
            let sql = queries::alter_object_name(&ObjectRef::EventTrigger(&current), new_name);
            tx::execute(txn, operation, op::EXECUTE, &sql).await?;
            current = new_name.clone();
        }
    }
    if let Some(enabled) = params.enabled {
        let sql = queries::alter_event_trigger_enabled(&current, enabled);
        tx::execute(txn, operation, op::EXECUTE, &sql).await?;
    }
    if let Some(owner) = &params.owner {
        let sql = queries::alter_object_owner(&ObjectRef::EventTrigger(&current), owner);
        tx::execute(txn, operation, op::EXECUTE, &sql).await?;
    }
    if let Some(comment) = &params.comment {
        let sql = queries::comment_on(&ObjectRef::EventTrigger(&current), Some(comment));
        tx::execute(txn, operation, op::CREATE_COMMENT, &sql).await?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_params() -> EventTriggerCreateParams {
        EventTriggerCreateParams {
            name: "audit".into(),
            event: "ddl_command_end".into(),
            exec_func: "audit_fn".into(),
            enabled: true,
            tags: vec!["CREATE TABLE".into(), "DROP TABLE".into()],
            owner: None,
            comment: Some("audit ddl".into()),
        }
    }

    #[test]
    fn create_params_accept_valid_input() {
        assert_eq!(create_params().validate().unwrap(), TriggerEvent::DdlCommandEnd);
    }

    #[test]
    fn create_params_rejections() {
        let cases: Vec<(&str, Box<dyn Fn(&mut EventTriggerCreateParams)>)> = vec![
            ("missing name", Box::new(|p| p.name.clear())),
            ("missing exec_func", Box::new(|p| p.exec_func.clear())),
            ("unknown event", Box::new(|p| p.event = "on_login".into())),
            ("empty event", Box::new(|p| p.event.clear())),
            ("duplicate tags", Box::new(|p| p.tags = vec!["A".into(), "A".into()])),
            ("empty tag", Box::new(|p| p.tags = vec!["".into()])),
            ("empty owner", Box::new(|p| p.owner = Some(String::new()))),
        ];
        for (name, modify) in cases {
            let mut p = create_params();
            modify(&mut p);
            let err = p.validate().expect_err(name);
            assert!(matches!(err, ClientError::Validation { .. }), "case {}", name);
        }
    }

    #[test]
    fn update_params_need_a_change() {
        let p = EventTriggerUpdateParams {
            name: "audit".into(),
            ..Default::default()
        };
        assert!(p.is_empty());
        assert!(p.validate().is_err());

        let p = EventTriggerUpdateParams {
            name: "audit".into(),
            comment: Some(String::new()),
            ..Default::default()
        };
        assert!(p.validate().is_ok());

        let p = EventTriggerUpdateParams {
            name: String::new(),
            enabled: Some(false),
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }
}

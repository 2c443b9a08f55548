use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::client::{DatabaseModel, PgClient};
use crate::framework::{
    decode, encode, Attribute, AttributeKind, DataSource, Diagnostics, Json, ProviderData,
    ReadDataSourceRequest, Schema, StateResponse, Value,
};

use super::docs;
use super::helpers::{configure_client, connect, normalize_comment, require_client};

pub const TYPE_NAME: &str = "postgresql_database";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseDataSourceModel {
    pub name: Value<String>,
    pub owner: Value<String>,
    pub comment: Value<String>,
    pub encoding: Value<String>,
    pub lc_collate: Value<String>,
    pub lc_ctype: Value<String>,
    pub connection_limit: Value<i64>,
    pub allow_connections: Value<bool>,
}

impl From<DatabaseModel> for DatabaseDataSourceModel {
    fn from(db: DatabaseModel) -> Self {
        DatabaseDataSourceModel {
            name: Value::Known(db.name),
            owner: Value::Known(db.owner),
            comment: normalize_comment(db.comment).into(),
            encoding: Value::Known(db.encoding),
            lc_collate: Value::Known(db.lc_collate),
            lc_ctype: Value::Known(db.lc_ctype),
            connection_limit: Value::Known(i64::from(db.conn_limit)),
            allow_connections: Value::Known(db.allow_conn),
        }
    }
}

#[derive(Default)]
pub struct DatabaseDataSource {
    client: Option<Arc<PgClient>>,
}

impl DatabaseDataSource {
    pub fn factory() -> Box<dyn DataSource> {
        Box::new(Self::default())
    }

    async fn read_model(&self, config: &Json, diags: &mut Diagnostics) -> Option<DatabaseDataSourceModel> {
        let client = require_client(&self.client, TYPE_NAME, diags)?;
        let model: DatabaseDataSourceModel = decode(config, "configuration", diags)?;
        let name = model.name.as_str().unwrap_or_default();

        let conn = connect(client, None, diags).await?;
        match conn.databases().get(name).await {
            Ok(db) => Some(db.into()),
            Err(e) => {
                diags.add_error(format!("Error reading database '{}'", name), e.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl DataSource for DatabaseDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(
            docs::DATA_SOURCE_DATABASE,
            vec![
                Attribute::required("name", AttributeKind::String).description("The name of the database."),
                Attribute::computed("owner", AttributeKind::String),
                Attribute::computed("comment", AttributeKind::String),
                Attribute::computed("encoding", AttributeKind::String),
                Attribute::computed("lc_collate", AttributeKind::String),
                Attribute::computed("lc_ctype", AttributeKind::String),
                Attribute::computed("connection_limit", AttributeKind::Int64)
                    .description("-1 means no limit."),
                Attribute::computed("allow_connections", AttributeKind::Bool),
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
        let model: DatabaseDataSourceModel = DatabaseModel {
            name: "app".into(),
            owner: "postgres".into(),
            comment: None,
            encoding: "UTF8".into(),
            lc_collate: "en_US.utf8".into(),
            lc_ctype: "en_US.utf8".into(),
            conn_limit: -1,
            allow_conn: true,
        }
        .into();
        assert_eq!(model.connection_limit, Value::Known(-1));
        assert!(model.comment.is_null());
        assert_eq!(
            serde_json::to_value(&model).unwrap()["allow_connections"],
            serde_json::json!(true)
        );
    }
}

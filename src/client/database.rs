use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::error::{op, ClientError, Result};
use super::queries;
use super::PgConnection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseModel {
    pub name: String,
    pub owner: String,
    pub comment: Option<String>,
    pub encoding: String,
    pub lc_collate: String,
    pub lc_ctype: String,
    pub conn_limit: i32,
    pub allow_conn: bool,
}

impl DatabaseModel {
    fn from_row(row: &Row) -> Result<Self> {
        let scan = |e| ClientError::query_step(op::GET_DATABASE, Some(op::SCAN_ROW_RESULT), e);
        Ok(DatabaseModel {
            name: row.try_get("name").map_err(scan)?,
            owner: row.try_get("owner").map_err(scan)?,
            comment: row.try_get("comment").map_err(scan)?,
            encoding: row.try_get("encoding").map_err(scan)?,
            lc_collate: row.try_get("lc_collate").map_err(scan)?,
            lc_ctype: row.try_get("lc_ctype").map_err(scan)?,
            conn_limit: row.try_get("conn_limit").map_err(scan)?,
            allow_conn: row.try_get("allow_conn").map_err(scan)?,
        })
    }
}

pub struct DatabaseRepository {
    conn: PgConnection,
}

impl DatabaseRepository {
    pub(crate) fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let client = self.conn.client().await?;
        let row = client
            .query_one(queries::database_exists(name).as_str(), &[])
            .await
            .map_err(|e| ClientError::query_step(op::EXISTS_DATABASE, Some(op::QUERY_ROW), e))?;
        row.try_get(0)
            .map_err(|e| ClientError::query_step(op::EXISTS_DATABASE, Some(op::SCAN_ROW_RESULT), e))
    }

    pub async fn get(&self, name: &str) -> Result<DatabaseModel> {
        let client = self.conn.client().await?;
        let row = client
            .query_opt(queries::database_info(name).as_str(), &[])
            .await
            .map_err(|e| ClientError::query_step(op::GET_DATABASE, Some(op::QUERY_ROW), e))?
            .ok_or_else(|| ClientError::not_found("database", name))?;
        DatabaseModel::from_row(&row)
    }
}

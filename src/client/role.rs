use super::error::{op, ClientError, Result};
use super::queries;
use super::PgConnection;

pub struct RoleRepository {
    conn: PgConnection,
}

impl RoleRepository {
    pub(crate) fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    pub async fn is_superuser(&self, role: &str) -> Result<bool> {
        self.query_superuser(&queries::role_is_superuser(role), role)
            .await
    }

    /// Whether the role this connection logged in as is a superuser.
    pub async fn current_is_superuser(&self) -> Result<bool> {
        self.query_superuser(&queries::current_role_is_superuser(), "current_user")
            .await
    }

    async fn query_superuser(&self, sql: &str, role: &str) -> Result<bool> {
        let client = self.conn.client().await?;
        let row = client
            .query_opt(sql, &[])
            .await
            .map_err(|e| ClientError::query_step(op::ROLE_SUPERUSER, Some(op::QUERY_ROW), e))?
            .ok_or_else(|| ClientError::not_found("role", role))?;
        row.try_get(0)
            .map_err(|e| ClientError::query_step(op::ROLE_SUPERUSER, Some(op::SCAN_ROW_RESULT), e))
    }
}

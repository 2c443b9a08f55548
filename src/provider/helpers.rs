use std::sync::Arc;

use chrono::Utc;
use log::{debug, trace};

use crate::client::{PgClient, PgConnection};
use crate::framework::{provider_data, Diagnostics, ProviderData};

pub(crate) const MSG_ERR_GET_CONNECTION: &str = "Error establishing a PostgreSQL connection";

/// Pick up the client handed out by the provider's `configure`.
pub(crate) fn configure_client(
    kind: &str,
    type_name: &str,
    data: Option<&ProviderData>,
    diags: &mut Diagnostics,
) -> Option<Arc<PgClient>> {
    trace!("configuring '{}' {}", type_name, kind);
    let client = provider_data::<PgClient>(data, kind, diags)?;
    let config = client.config();
    debug!(
        "loaded client for {} (host={}, username={}, database={})",
        type_name, config.host, config.username, config.database
    );
    Some(client)
}

/// Fails with a diagnostic when the provider was never configured.
pub(crate) fn require_client<'a>(
    client: &'a Option<Arc<PgClient>>,
    type_name: &str,
    diags: &mut Diagnostics,
) -> Option<&'a PgClient> {
    if client.is_none() {
        diags.add_error(
            "Provider not configured",
            format!(
                "{} was called before the provider was configured. Please report this issue to the provider developers.",
                type_name
            ),
        );
    }
    client.as_deref()
}

pub(crate) async fn connect(
    client: &PgClient,
    database: Option<&str>,
    diags: &mut Diagnostics,
) -> Option<PgConnection> {
    match client.get_connection(database).await {
        Ok(conn) => Some(conn),
        Err(e) => {
            diags.add_error(MSG_ERR_GET_CONNECTION, e.to_string());
            None
        }
    }
}

/// Split a `database.name` identifier into its two non-empty parts.
pub(crate) fn parse_id(id: &str) -> Option<(&str, &str)> {
    let (database, name) = id.split_once('.')?;
    if database.is_empty() || name.is_empty() || name.contains('.') {
        return None;
    }
    Some((database, name))
}

pub(crate) fn format_id(database: &str, name: &str) -> String {
    format!("{}.{}", database, name)
}

/// RFC 850 style, e.g. `Monday, 02-Jan-06 15:04:05 UTC`.
pub(crate) fn timestamp() -> String {
    Utc::now().format("%A, %d-%b-%y %H:%M:%S UTC").to_string()
}

/// An empty comment in the catalog is the same as no comment.
pub(crate) fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment.filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_need_exactly_two_parts() {
        assert_eq!(parse_id("app.audit"), Some(("app", "audit")));
        assert_eq!(parse_id("audit"), None);
        assert_eq!(parse_id(".audit"), None);
        assert_eq!(parse_id("app."), None);
        assert_eq!(parse_id("app.audit.extra"), None);
        assert_eq!(format_id("app", "audit"), "app.audit");
    }

    #[test]
    fn timestamp_is_rfc850() {
        let ts = timestamp();
        assert!(ts.ends_with(" UTC"));
        assert!(ts.contains(", "));
        assert_eq!(ts.matches('-').count(), 2);
    }

    #[test]
    fn missing_client_is_reported() {
        let mut diags = Diagnostics::new();
        assert!(require_client(&None, "postgresql_event_trigger", &mut diags).is_none());
        assert!(diags.has_error());
    }
}

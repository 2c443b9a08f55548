//! Provider blocks read from disk for the command-line driver.
//!
//! HCL files may hold a `provider "postgresql" { ... }` block or bare
//! attributes. JSON files hold the attribute object, optionally nested under
//! `provider.postgresql`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use hcl::Body;

use crate::framework::Json;

use super::TYPE_NAME;

/// Read a provider configuration file, choosing the format by extension.
pub fn load_provider_config(path: &Path) -> Result<Json> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading provider configuration from {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_json(&contents)
    } else {
        parse_hcl(&contents)
    };
    parsed.with_context(|| format!("parsing provider configuration {}", path.display()))
}

pub fn parse_hcl(contents: &str) -> Result<Json> {
    let body: Body = hcl::from_str(contents).context("invalid HCL")?;
    let mut providers = body.blocks().filter(|b| b.identifier() == "provider");
    let body = match providers.next() {
        Some(block) => {
            let label = block.labels().first().map(|l| l.as_str()).unwrap_or_default();
            if label != TYPE_NAME {
                bail!("expected a provider \"{}\" block, found provider \"{}\"", TYPE_NAME, label);
            }
            if providers.next().is_some() {
                bail!("more than one provider block");
            }
            block.body().clone()
        }
        None => body,
    };
    let value: Json = hcl::from_body(body).context("provider block is not plain data")?;
    into_object(value)
}

pub fn parse_json(contents: &str) -> Result<Json> {
    let value: Json = serde_json::from_str(contents).context("invalid JSON")?;
    let value = match value.pointer(&format!("/provider/{}", TYPE_NAME)) {
        Some(nested) => nested.clone(),
        None => value,
    };
    into_object(value)
}

fn into_object(value: Json) -> Result<Json> {
    match value {
        Json::Object(_) => Ok(value),
        Json::Null => Ok(Json::Object(Default::default())),
        other => bail!("provider configuration must be an object, got {}", other),
    }
}

use serde::Serialize;
use serde_json::Map;

use super::diag::Diagnostics;
use super::types::{is_unknown_json, unknown_json, Json};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Int64,
    Bool,
    Set(Box<AttributeKind>),
    List(Box<AttributeKind>),
    Object(Vec<(&'static str, AttributeKind)>),
}

impl AttributeKind {
    pub fn set_of_string() -> Self {
        AttributeKind::Set(Box::new(AttributeKind::String))
    }

    fn describe(&self) -> String {
        match self {
            AttributeKind::String => "string".into(),
            AttributeKind::Int64 => "number".into(),
            AttributeKind::Bool => "bool".into(),
            AttributeKind::Set(inner) => format!("set of {}", inner.describe()),
            AttributeKind::List(inner) => format!("list of {}", inner.describe()),
            AttributeKind::Object(_) => "object".into(),
        }
    }

    /// Shallow-to-deep type check; unknown and null leaves are accepted.
    fn accepts(&self, v: &Json) -> bool {
        if v.is_null() || is_unknown_json(v) {
            return true;
        }
        match (self, v) {
            (AttributeKind::String, Json::String(_)) => true,
            (AttributeKind::Int64, Json::Number(n)) => n.is_i64(),
            (AttributeKind::Bool, Json::Bool(_)) => true,
            (AttributeKind::Set(inner), Json::Array(items))
            | (AttributeKind::List(inner), Json::Array(items)) => {
                items.iter().all(|i| !i.is_null() && inner.accepts(i))
            }
            (AttributeKind::Object(fields), Json::Object(map)) => {
                map.keys().all(|k| fields.iter().any(|(name, _)| *name == k.as_str()))
                    && fields
                        .iter()
                        .all(|(name, kind)| map.get(*name).map_or(true, |v| kind.accepts(v)))
            }
            _ => false,
        }
    }

    /// Sets compare without regard to order.
    fn equal(&self, a: &Json, b: &Json) -> bool {
        match (self, a, b) {
            (AttributeKind::Set(_), Json::Array(x), Json::Array(y)) => {
                let mut x: Vec<String> = x.iter().map(Json::to_string).collect();
                let mut y: Vec<String> = y.iter().map(Json::to_string).collect();
                x.sort();
                y.sort();
                x == y
            }
            _ => a == b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    OneOf(Vec<&'static str>),
    AtLeast(i64),
}

impl Validator {
    fn check(&self, attr: &str, v: &Json, diags: &mut Diagnostics) {
        match (self, v) {
            (Validator::OneOf(allowed), Json::String(s)) if !allowed.contains(&s.as_str()) => {
                diags.add_attribute_error(
                    attr,
                    "Invalid Attribute Value Match",
                    format!(
                        "Attribute {} value must be one of: {:?}, got: \"{}\"",
                        attr, allowed, s
                    ),
                );
            }
            (Validator::AtLeast(min), Json::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    if i < *min {
                        diags.add_attribute_error(
                            attr,
                            "Invalid Attribute Value",
                            format!("Attribute {} value must be at least {}, got: {}", attr, min, i),
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// A change to this attribute destroys and recreates the object.
    RequiresReplace,
    /// Keep the prior value instead of marking the attribute unknown.
    UseStateForUnknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            default: None,
        }
    }

    pub fn required(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            required: true,
            ..Self::new(name, kind)
        }
    }

    pub fn optional(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            optional: true,
            ..Self::new(name, kind)
        }
    }

    pub fn computed(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            computed: true,
            ..Self::new(name, kind)
        }
    }

    pub fn optional_computed(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(name, kind)
        }
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn validator(mut self, v: Validator) -> Self {
        self.validators.push(v);
        self
    }

    pub fn modifier(mut self, m: PlanModifier) -> Self {
        self.plan_modifiers.push(m);
        self
    }

    /// Static default; the attribute must be computed for the host to accept it.
    pub fn default_value(mut self, v: Json) -> Self {
        self.default = Some(v);
        self
    }

    fn has_modifier(&self, m: PlanModifier) -> bool {
        self.plan_modifiers.contains(&m)
    }

    fn computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

/// Result of planning one resource change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedChange {
    pub planned_state: Json,
    pub requires_replace: Vec<String>,
}

impl Schema {
    pub fn new(description: &'static str, attributes: Vec<Attribute>) -> Self {
        Self {
            description,
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a configuration object against the schema.
    pub fn validate_config(&self, config: &Json) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let empty = Map::new();
        let map = match config {
            Json::Object(map) => map,
            Json::Null => &empty,
            _ => {
                diags.add_error(
                    "Invalid configuration",
                    "configuration must be an object of attribute values",
                );
                return diags;
            }
        };

        for key in map.keys() {
            if self.attribute(key).is_none() {
                diags.add_attribute_error(
                    key,
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here.", key),
                );
            }
        }

        for attr in &self.attributes {
            let value = map.get(attr.name).unwrap_or(&Json::Null);
            if value.is_null() {
                if attr.required {
                    diags.add_attribute_error(
                        attr.name,
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", attr.name),
                    );
                }
                continue;
            }
            if attr.computed_only() {
                diags.add_attribute_error(
                    attr.name,
                    "Invalid Configuration for Read-Only Attribute",
                    format!("Cannot set value for attribute \"{}\" as it is computed only.", attr.name),
                );
                continue;
            }
            if !attr.kind.accepts(value) {
                diags.add_attribute_error(
                    attr.name,
                    "Incorrect attribute value type",
                    format!("Inappropriate value for attribute \"{}\": {} required.", attr.name, attr.kind.describe()),
                );
                continue;
            }
            if is_unknown_json(value) {
                continue;
            }
            for v in &attr.validators {
                v.check(attr.name, value, &mut diags);
            }
        }
        diags
    }

    /// Compute the planned state from configuration and prior state.
    ///
    /// Configured values win, then static defaults. Computed attributes keep
    /// their prior value when nothing configurable changed (or when marked
    /// `UseStateForUnknown`) and become unknown otherwise. A replacement
    /// resets every unconfigured computed attribute to unknown.
    pub fn plan(&self, prior: Option<&Json>, config: &Json) -> PlannedChange {
        let prior = prior.filter(|p| !p.is_null());
        let prior_value = |name: &str| -> Json {
            prior
                .and_then(|p| p.get(name))
                .cloned()
                .unwrap_or(Json::Null)
        };

        let mut planned = Map::new();
        let mut pending = Vec::new();
        let mut changed = prior.is_none();

        for attr in &self.attributes {
            let configured = config.get(attr.name).cloned().unwrap_or(Json::Null);
            let value = if !configured.is_null() {
                configured
            } else if let Some(default) = &attr.default {
                default.clone()
            } else if attr.computed {
                pending.push(attr);
                continue;
            } else {
                Json::Null
            };
            if !attr.kind.equal(&value, &prior_value(attr.name)) {
                changed = true;
            }
            planned.insert(attr.name.to_string(), value);
        }

        let mut requires_replace = Vec::new();
        if prior.is_some() {
            for attr in &self.attributes {
                if !attr.has_modifier(PlanModifier::RequiresReplace) {
                    continue;
                }
                let value = planned.get(attr.name).cloned().unwrap_or_else(|| prior_value(attr.name));
                if !is_unknown_json(&value) && !attr.kind.equal(&value, &prior_value(attr.name)) {
                    requires_replace.push(attr.name.to_string());
                }
            }
        }
        let replacing = !requires_replace.is_empty();

        for attr in pending {
            let keep = prior.is_some()
                && !replacing
                && (attr.has_modifier(PlanModifier::UseStateForUnknown) || !changed);
            let value = if keep {
                prior_value(attr.name)
            } else {
                unknown_json()
            };
            planned.insert(attr.name.to_string(), value);
        }

        PlannedChange {
            planned_state: Json::Object(planned),
            requires_replace,
        }
    }
}

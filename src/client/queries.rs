use std::fmt;
use std::str::FromStr;

use super::error::{ClientError, Result};
use super::function::FunctionArg;
use super::quote::{ident, literal, literal_list, qualified_ident};

/// Catalog objects the provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Database,
    EventTrigger,
    Function,
}

impl ObjectKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ObjectKind::Database => "DATABASE",
            ObjectKind::EventTrigger => "EVENT TRIGGER",
            ObjectKind::Function => "FUNCTION",
        }
    }
}

/// A reference to one object as it appears in DDL.
#[derive(Debug, Clone)]
pub enum ObjectRef<'a> {
    Database(&'a str),
    EventTrigger(&'a str),
    Function {
        name: &'a str,
        arg_types: Vec<String>,
    },
}

impl ObjectRef<'_> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRef::Database(_) => ObjectKind::Database,
            ObjectRef::EventTrigger(_) => ObjectKind::EventTrigger,
            ObjectRef::Function { .. } => ObjectKind::Function,
        }
    }

    /// Quoted target without the object keyword.
    pub fn target(&self) -> String {
        match self {
            ObjectRef::Database(name) | ObjectRef::EventTrigger(name) => ident(name),
            ObjectRef::Function { name, arg_types } => {
                format!("{}({})", qualified_ident(name), arg_types.join(", "))
            }
        }
    }
}

impl fmt::Display for ObjectRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind().keyword(), self.target())
    }
}

pub fn alter_object_name(object: &ObjectRef<'_>, new_name: &str) -> String {
    format!("ALTER {} RENAME TO {};", object, ident(new_name))
}

pub fn alter_object_owner(object: &ObjectRef<'_>, owner: &str) -> String {
    format!("ALTER {} OWNER TO {};", object, ident(owner))
}

/// `None` clears the comment.
pub fn comment_on(object: &ObjectRef<'_>, comment: Option<&str>) -> String {
    let value = comment.map(literal).unwrap_or_else(|| "NULL".to_string());
    format!("COMMENT ON {} IS {};", object, value)
}

pub fn drop_object(object: &ObjectRef<'_>) -> String {
    format!("DROP {} IF EXISTS {};", object.kind().keyword(), object.target())
}

pub fn database_exists(name: &str) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_database d WHERE d.datname = {});",
        literal(name)
    )
}

pub fn database_info(name: &str) -> String {
    format!(
        r#"SELECT d.datname::text                                      AS "name",
       pg_catalog.pg_get_userbyid(d.datdba)::text             AS "owner",
       pg_catalog.shobj_description(d.oid, 'pg_database')     AS "comment",
       pg_catalog.pg_encoding_to_char(d.encoding)::text       AS "encoding",
       d.datcollate::text                                     AS "lc_collate",
       d.datctype::text                                       AS "lc_ctype",
       d.datconnlimit                                         AS "conn_limit",
       d.datallowconn                                         AS "allow_conn"
FROM pg_catalog.pg_database d
WHERE d.datname = {};"#,
        literal(name)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    DdlCommandStart,
    DdlCommandEnd,
    SqlDrop,
    TableRewrite,
}

impl TriggerEvent {
    pub const ALL: [&'static str; 4] = [
        "ddl_command_start",
        "ddl_command_end",
        "sql_drop",
        "table_rewrite",
    ];
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerEvent::DdlCommandStart => "ddl_command_start",
            TriggerEvent::DdlCommandEnd => "ddl_command_end",
            TriggerEvent::SqlDrop => "sql_drop",
            TriggerEvent::TableRewrite => "table_rewrite",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TriggerEvent {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ddl_command_start" => Ok(TriggerEvent::DdlCommandStart),
            "ddl_command_end" => Ok(TriggerEvent::DdlCommandEnd),
            "sql_drop" => Ok(TriggerEvent::SqlDrop),
            "table_rewrite" => Ok(TriggerEvent::TableRewrite),
            _ => Err(ClientError::validation(
                "event trigger parameters",
                format!("event must be one of {:?}, got '{}'", TriggerEvent::ALL, s),
            )),
        }
    }
}

pub fn event_trigger_exists(name: &str) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_event_trigger e WHERE e.evtname = {});",
        literal(name)
    )
}

#[derive(Debug, Clone)]
pub struct CreateEventTrigger<'a> {
    pub name: &'a str,
    pub event: TriggerEvent,
    pub tags: &'a [String],
    pub exec_func: &'a str,
}

impl fmt::Display for CreateEventTrigger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = if self.tags.is_empty() {
            String::new()
        } else {
            format!("\n    WHEN TAG IN ({})", literal_list(self.tags))
        };
        write!(
            f,
            "CREATE EVENT TRIGGER {name}\n    ON {event}{when}\n    EXECUTE FUNCTION {func}();",
            name = ident(self.name),
            event = self.event,
            when = when,
            func = qualified_ident(self.exec_func),
        )
    }
}

/// Functions outside `public` are reported schema-qualified.
pub fn event_trigger_info(name: &str) -> String {
    format!(
        r#"SELECT e.evtname::text                                          AS "name",
       e.evtevent::text                                         AS "event",
       e.evttags                                                AS "tags",
       e.evtenabled::text                                       AS "enabled",
       CASE WHEN n.nspname = 'public' THEN p.proname::text
            ELSE n.nspname::text || '.' || p.proname::text END  AS "exec_func",
       pg_catalog.current_database()::text                      AS "database",
       pg_catalog.pg_get_userbyid(e.evtowner)::text             AS "owner",
       pg_catalog.obj_description(e.oid, 'pg_event_trigger')    AS "comment"
FROM pg_catalog.pg_event_trigger e
         LEFT JOIN pg_catalog.pg_proc p ON p.oid = e.evtfoid
         LEFT JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
WHERE e.evtname = {};"#,
        literal(name)
    )
}

pub fn alter_event_trigger_enabled(name: &str, enabled: bool) -> String {
    let state = if enabled { "ENABLE ALWAYS" } else { "DISABLE" };
    format!("ALTER EVENT TRIGGER {} {};", ident(name), state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Plpgsql,
    Sql,
}

impl Language {
    pub const ALL: [&'static str; 2] = ["plpgsql", "sql"];
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Plpgsql => write!(f, "plpgsql"),
            Language::Sql => write!(f, "sql"),
        }
    }
}

impl FromStr for Language {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plpgsql" => Ok(Language::Plpgsql),
            "sql" => Ok(Language::Sql),
            _ => Err(ClientError::validation(
                "function parameters",
                format!("language must be one of {:?}, got '{}'", Language::ALL, s),
            )),
        }
    }
}

/// Split `schema.name`; unqualified names live in `public`.
pub fn split_function_name(name: &str) -> (&str, &str) {
    name.split_once('.').unwrap_or(("public", name))
}

pub fn function_exists(name: &str) -> String {
    let (schema, func) = split_function_name(name);
    format!(
        "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_proc f \
         JOIN pg_catalog.pg_namespace n ON n.oid = f.pronamespace \
         WHERE f.proname = {} AND n.nspname = {});",
        literal(func),
        literal(schema)
    )
}

#[derive(Debug, Clone)]
pub struct CreateFunction<'a> {
    pub name: &'a str,
    pub args: &'a [FunctionArg],
    pub returns: &'a str,
    pub language: Language,
    pub body: &'a str,
    pub replace: bool,
}

impl fmt::Display for CreateFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_replace = if self.replace { "OR REPLACE " } else { "" };
        let args = self
            .args
            .iter()
            .map(|a| a.to_sql())
            .collect::<Vec<_>>()
            .join(", ");
        let tag = super::quote::dollar_tag(self.body);
        write!(
            f,
            "CREATE {or_replace}FUNCTION {name}({args})\n    RETURNS {returns}\n    LANGUAGE {lang}\nAS {tag}{body}{tag};",
            or_replace = or_replace,
            name = qualified_ident(self.name),
            args = args,
            returns = self.returns.trim(),
            lang = self.language,
            tag = tag,
            body = self.body,
        )
    }
}

pub fn drop_function(name: &str, args: &[FunctionArg]) -> String {
    drop_object(&ObjectRef::Function {
        name,
        arg_types: args.iter().map(|a| a.r#type.clone()).collect(),
    })
}

pub fn function_info(name: &str) -> String {
    let (schema, func) = split_function_name(name);
    format!(
        r#"SELECT p.proname::text                                   AS "name",
       pg_catalog.pg_get_function_arguments(p.oid)       AS "args",
       pg_catalog.pg_get_function_result(p.oid)          AS "returns",
       l.lanname::text                                   AS "language",
       p.prosrc                                          AS "body",
       pg_catalog.current_database()::text               AS "database",
       pg_catalog.pg_get_userbyid(p.proowner)::text      AS "owner",
       pg_catalog.obj_description(p.oid, 'pg_proc')      AS "comment"
FROM pg_catalog.pg_proc p
         JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
         JOIN pg_catalog.pg_language l ON l.oid = p.prolang
WHERE p.proname = {} AND n.nspname = {}
ORDER BY p.oid
LIMIT 1;"#,
        literal(func),
        literal(schema)
    )
}

pub fn role_is_superuser(role: &str) -> String {
    format!(
        "SELECT r.rolsuper FROM pg_catalog.pg_roles r WHERE r.rolname = {};",
        literal(role)
    )
}

pub fn current_role_is_superuser() -> String {
    "SELECT r.rolsuper FROM pg_catalog.pg_roles r WHERE r.rolname = current_user;".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_statements_quote_names() {
        let trigger = ObjectRef::EventTrigger("audit");
        assert_eq!(
            alter_object_name(&trigger, "audit v2"),
            "ALTER EVENT TRIGGER \"audit\" RENAME TO \"audit v2\";"
        );
        assert_eq!(
            alter_object_owner(&trigger, "admin"),
            "ALTER EVENT TRIGGER \"audit\" OWNER TO \"admin\";"
        );
        assert_eq!(
            drop_object(&trigger),
            "DROP EVENT TRIGGER IF EXISTS \"audit\";"
        );
        assert_eq!(
            comment_on(&trigger, Some("it's audited")),
            "COMMENT ON EVENT TRIGGER \"audit\" IS 'it''s audited';"
        );
        assert_eq!(
            comment_on(&trigger, None),
            "COMMENT ON EVENT TRIGGER \"audit\" IS NULL;"
        );
    }

    #[test]
    fn function_reference_includes_signature() {
        let f = ObjectRef::Function {
            name: "util.add",
            arg_types: vec!["integer".into(), "integer".into()],
        };
        assert_eq!(f.to_string(), "FUNCTION \"util\".\"add\"(integer, integer)");
        assert_eq!(
            drop_object(&f),
            "DROP FUNCTION IF EXISTS \"util\".\"add\"(integer, integer);"
        );
    }

    #[test]
    fn database_queries_quote_literals() {
        assert!(database_exists("app").contains("d.datname = 'app'"));
        let sql = database_info("o'brien");
        assert!(sql.contains("WHERE d.datname = 'o''brien';"));
        assert!(sql.contains("AS \"conn_limit\""));
    }

    #[test]
    fn create_event_trigger_with_tags() {
        let tags = vec!["CREATE TABLE".to_string(), "ALTER TABLE".to_string()];
        let stmt = CreateEventTrigger {
            name: "audit",
            event: TriggerEvent::DdlCommandStart,
            tags: &tags,
            exec_func: "audit_fn",
        };
        let sql = stmt.to_string();
        assert!(sql.starts_with("CREATE EVENT TRIGGER \"audit\""));
        assert!(sql.contains("ON ddl_command_start"));
        assert!(sql.contains("WHEN TAG IN ('CREATE TABLE', 'ALTER TABLE')"));
        assert!(sql.ends_with("EXECUTE FUNCTION \"audit_fn\"();"));
    }

    #[test]
    fn create_event_trigger_without_tags() {
        let stmt = CreateEventTrigger {
            name: "drops",
            event: TriggerEvent::SqlDrop,
            tags: &[],
            exec_func: "ops.log_drop",
        };
        let sql = stmt.to_string();
        assert!(!sql.contains("WHEN TAG"));
        assert!(sql.contains("EXECUTE FUNCTION \"ops\".\"log_drop\"();"));
    }

    #[test]
    fn event_trigger_enable_disable() {
        assert_eq!(
            alter_event_trigger_enabled("audit", true),
            "ALTER EVENT TRIGGER \"audit\" ENABLE ALWAYS;"
        );
        assert_eq!(
            alter_event_trigger_enabled("audit", false),
            "ALTER EVENT TRIGGER \"audit\" DISABLE;"
        );
    }

    #[test]
    fn event_trigger_lookups() {
        assert!(event_trigger_exists("audit").contains("e.evtname = 'audit'"));
        let sql = event_trigger_info("audit");
        assert!(sql.contains("WHERE e.evtname = 'audit';"));
        assert!(sql.contains("e.evtenabled::text"));
    }

    #[test]
    fn trigger_event_parsing() {
        for name in TriggerEvent::ALL {
            let ev: TriggerEvent = name.parse().unwrap();
            assert_eq!(ev.to_string(), name);
        }
        assert!("ddl_command_middle".parse::<TriggerEvent>().is_err());
    }

    #[test]
    fn create_function_renders_arguments() {
        let args = vec![
            FunctionArg::new("a", "integer"),
            FunctionArg::new("b", "integer"),
        ];
        let stmt = CreateFunction {
            name: "add",
            args: &args,
            returns: "integer",
            language: Language::Sql,
            body: "SELECT a + b",
            replace: true,
        };
        let sql = stmt.to_string();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION \"add\"(\"a\" integer, \"b\" integer)"));
        assert!(sql.contains("RETURNS integer"));
        assert!(sql.contains("LANGUAGE sql"));
        assert!(sql.ends_with("AS $$SELECT a + b$$;"));
    }

    #[test]
    fn create_function_without_replace_and_nested_dollars() {
        let stmt = CreateFunction {
            name: "evt",
            args: &[],
            returns: "event_trigger",
            language: Language::Plpgsql,
            body: "BEGIN PERFORM $$x$$; END;",
            replace: false,
        };
        let sql = stmt.to_string();
        assert!(sql.starts_with("CREATE FUNCTION \"evt\"()"));
        assert!(sql.contains("AS $body$BEGIN PERFORM $$x$$; END;$body$;"));
    }

    #[test]
    fn create_function_body_ending_in_dollar() {
        let stmt = CreateFunction {
            name: "alias",
            args: &[],
            returns: "integer",
            language: Language::Sql,
            body: "SELECT 1 AS \"x$\"",
            replace: true,
        };
        assert!(stmt.to_string().contains("AS $body$SELECT 1 AS \"x$\"$body$;"));
    }

    #[test]
    fn function_lookups_split_schema() {
        let sql = function_info("util.add");
        assert!(sql.contains("p.proname = 'add' AND n.nspname = 'util'"));
        let sql = function_exists("add");
        assert!(sql.contains("f.proname = 'add' AND n.nspname = 'public'"));
        assert_eq!(
            drop_function("add", &[FunctionArg::new("a", "integer")]),
            "DROP FUNCTION IF EXISTS \"add\"(integer);"
        );
    }

    #[test]
    fn language_parsing() {
        assert_eq!("PLPGSQL".parse::<Language>().unwrap(), Language::Plpgsql);
        assert_eq!("sql".parse::<Language>().unwrap(), Language::Sql);
        assert!("python".parse::<Language>().is_err());
    }

    #[test]
    fn role_queries() {
        assert!(role_is_superuser("postgres").contains("r.rolname = 'postgres'"));
        assert!(current_role_is_superuser().contains("current_user"));
    }
}

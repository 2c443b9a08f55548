use postgres_protocol::escape::{escape_identifier, escape_literal};
use regex::Regex;
use std::sync::OnceLock;

/// Quote a value for use in a literal position.
pub fn literal(s: &str) -> String {
    escape_literal(s)
}

/// Quote a single identifier.
pub fn ident(s: &str) -> String {
    escape_identifier(s)
}

/// Quote a possibly schema-qualified name part by part (`a.b` -> `"a"."b"`).
pub fn qualified_ident(s: &str) -> String {
    s.split('.').map(ident).collect::<Vec<_>>().join(".")
}

pub fn literal_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| literal(i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Type expressions (`integer`, `numeric(10, 2)`, `text[]`, `setof record`)
/// cannot be quoted, so they are restricted to a conservative character set.
pub fn is_type_expr(s: &str) -> bool {
    static TYPE_EXPR: OnceLock<Regex> = OnceLock::new();
    let re = TYPE_EXPR.get_or_init(|| {
        Regex::new(r#"^[A-Za-z_][A-Za-z0-9_ .,"\[\]()]*$"#).expect("valid type regex")
    });
    re.is_match(s.trim())
}

/// Pick a dollar-quote tag whose first occurrence after the opening tag is
/// the closing one, including matches that straddle the end of `body`.
pub fn dollar_tag(body: &str) -> String {
    let closes_cleanly = |tag: &str| format!("{}{}", body, tag).find(tag) == Some(body.len());
    if closes_cleanly("$$") {
        return "$$".to_string();
    }
    let mut n = 0usize;
    loop {
        let tag = if n == 0 {
            "$body$".to_string()
        } else {
            format!("$body{}$", n)
        };
        if closes_cleanly(&tag) {
            return tag;
        }
        n += 1;
    }
}

use std::collections::HashSet;
use std::fmt;

use deadpool_postgres::Transaction;
use log::info;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::error::{op, ClientError, Result};
use super::queries::{self, CreateFunction, Language, ObjectRef};
use super::quote::{ident, is_type_expr};
use super::tx;
use super::PgConnection;

const CONTEXT: &str = "function parameters";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionArg {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

impl FunctionArg {
    pub fn new(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
        }
    }

    pub(crate) fn to_sql(&self) -> String {
        if self.name.is_empty() {
            self.r#type.clone()
        } else {
            format!("{} {}", ident(&self.name), self.r#type)
        }
    }
}

impl fmt::Display for FunctionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.r#type)
        } else {
            write!(f, "{} {}", self.name, self.r#type)
        }
    }
}

/// Parse the output of `pg_get_function_arguments` (`a integer, b numeric(10,2) DEFAULT 1`).
pub fn parse_function_args(s: &str) -> Vec<FunctionArg> {
    split_top_level(s)
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(|part| parse_arg(&part))
        .collect()
}

fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' | '[' if !in_quotes => depth += 1,
            ')' | ']' if !in_quotes => depth -= 1,
            ',' if depth == 0 && !in_quotes => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts
}

fn parse_arg(part: &str) -> FunctionArg {
    let mut rest = part;
    for mode in ["INOUT ", "IN ", "OUT ", "VARIADIC "] {
        if let Some(stripped) = rest.strip_prefix(mode) {
            rest = stripped;
            break;
        }
    }
    if let Some(idx) = rest.find(" DEFAULT ") {
        rest = &rest[..idx];
    }

    if let Some(quoted) = rest.strip_prefix('"') {
        if let Some(end) = quoted.find('"') {
            return FunctionArg::new(&quoted[..end], quoted[end + 1..].trim());
        }
    }
    match rest.split_once(' ') {
        Some((name, ty)) => FunctionArg::new(name, ty.trim()),
        None => FunctionArg::new("", rest),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFunctionModel {
    pub name: String,
    pub args: Vec<FunctionArg>,
    pub returns: String,
    pub language: String,
    pub body: String,
    pub database: String,
    pub owner: String,
    pub comment: Option<String>,
}

impl UserFunctionModel {
    fn from_row(name: &str, row: &Row) -> Result<Self> {
        let scan = |e| ClientError::query_step(op::GET_USER_FUNCTION, Some(op::SCAN_ROW_RESULT), e);
        let args: String = row.try_get("args").map_err(scan)?;
        Ok(UserFunctionModel {
            name: name.to_string(),
            args: parse_function_args(&args),
            returns: row.try_get("returns").map_err(scan)?,
            language: row.try_get("language").map_err(scan)?,
            body: row.try_get("body").map_err(scan)?,
            database: row.try_get("database").map_err(scan)?,
            owner: row.try_get("owner").map_err(scan)?,
            comment: row.try_get("comment").map_err(scan)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFunctionCreateParams {
    pub name: String,
    pub args: Vec<FunctionArg>,
    pub returns: String,
    pub language: String,
    pub body: String,
    pub replace: bool,
    pub owner: Option<String>,
    pub comment: Option<String>,
}

impl UserFunctionCreateParams {
    pub fn validate(&self) -> Result<Language> {
        if self.name.is_empty() {
            return Err(ClientError::validation(CONTEXT, "name is required"));
        }
        let mut seen = HashSet::new();
        for arg in &self.args {
            if arg.name.is_empty() || arg.r#type.is_empty() {
                return Err(ClientError::validation(
                    CONTEXT,
                    "every argument needs a name and a type",
                ));
            }
            if !seen.insert(arg.name.as_str()) {
                return Err(ClientError::validation(
                    CONTEXT,
                    format!("argument names must be unique, '{}' is repeated", arg.name),
                ));
            }
            if !is_type_expr(&arg.r#type) {
                return Err(ClientError::validation(
                    CONTEXT,
                    format!("argument '{}' has an invalid type '{}'", arg.name, arg.r#type),
                ));
            }
        }
        if self.returns.is_empty() {
            return Err(ClientError::validation(CONTEXT, "returns is required"));
        }
        if !is_type_expr(&self.returns) {
            return Err(ClientError::validation(
                CONTEXT,
                format!("invalid return type '{}'", self.returns),
            ));
        }
        if self.body.is_empty() {
            return Err(ClientError::validation(CONTEXT, "body is required"));
        }
        if matches!(self.owner.as_deref(), Some("")) {
            return Err(ClientError::validation(CONTEXT, "owner must not be empty"));
        }
        self.language.parse()
    }

    fn object(&self) -> ObjectRef<'_> {
        ObjectRef::Function {
            name: &self.name,
            arg_types: self.args.iter().map(|a| a.r#type.clone()).collect(),
        }
    }
}

pub struct UserFunctionRepository {
    conn: PgConnection,
}

impl UserFunctionRepository {
    pub(crate) fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    /// With `replace` set this also updates an existing function in place.
    pub async fn create(&self, params: &UserFunctionCreateParams) -> Result<()> {
        let language = params.validate()?;
        let operation = if params.replace {
            op::UPDATE_USER_FUNCTION
        } else {
            op::CREATE_USER_FUNCTION
        };
        let mut client = self.conn.client().await?;
        let txn = tx::begin(&mut client, operation).await?;
        let result = apply_create(&txn, operation, params, language).await;
        tx::finish(txn, operation, result).await?;
        info!("function '{}' created", params.name);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<UserFunctionModel> {
        let client = self.conn.client().await?;
        let row = client
            .query_opt(queries::function_info(name).as_str(), &[])
            .await
            .map_err(|e| ClientError::query_step(op::GET_USER_FUNCTION, Some(op::QUERY_ROW), e))?
            .ok_or_else(|| ClientError::not_found("function", name))?;
        UserFunctionModel::from_row(name, &row)
    }

    pub async fn drop(&self, name: &str, args: &[FunctionArg]) -> Result<()> {
        let mut client = self.conn.client().await?;
        let txn = tx::begin(&mut client, op::DROP_USER_FUNCTION).await?;
        let sql = queries::drop_function(name, args);
        let result = tx::execute(&txn, op::DROP_USER_FUNCTION, op::DROP_OBJECT, &sql)
            .await
            .map(|_| ());
        tx::finish(txn, op::DROP_USER_FUNCTION, result).await?;
        info!("function '{}' dropped", name);
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let client = self.conn.client().await?;
        let row = client
            .query_one(queries::function_exists(name).as_str(), &[])
            .await
            .map_err(|e| ClientError::query_step(op::EXISTS_USER_FUNCTION, Some(op::QUERY_ROW), e))?;
        row.try_get(0)
            .map_err(|e| ClientError::query_step(op::EXISTS_USER_FUNCTION, Some(op::SCAN_ROW_RESULT), e))
    }
}

async fn apply_create(
    txn: &Transaction<'_>,
    operation: &'static str,
    params: &UserFunctionCreateParams,
    language: Language,
) -> Result<()> {
    let create = CreateFunction {
        name: &params.name,
        args: &params.args,
        returns: &params.returns,
        language,
        body: &params.body,
        replace: params.replace,
    };
    tx::execute(txn, operation, op::EXECUTE, &create.to_string()).await?;

    let object = params.object();
    if let Some(owner) = &params.owner {
        tx::execute(txn, operation, op::EXECUTE, &queries::alter_object_owner(&object, owner)).await?;
    }
    if let Some(comment) = &params.comment {
        let sql = queries::comment_on(&object, Some(comment));
        tx::execute(txn, operation, op::CREATE_COMMENT, &sql).await?;
    }
    Ok(())
}

use std::{borrow::Cow, error::Error, fmt::Debug};

use diesel::{r2d2::ConnectionManager, PgConnection};
use r2d2::{Pool, PooledConnection};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::telemetry::spawn_blocking_with_tracing;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn error_fmt_chain(f: &mut std::fmt::Formatter<'_>, source: &Option<impl Error>) -> std::fmt::Result{
    if let Some(error) = source{
        write!(f, "\n\tCaused By:\n\t")?;
        write!(f, "{:?}", &error)?;
        error_fmt_chain(f, &error.source())
    } else {
        Ok(())
    }
}

pub async fn get_pooled_connection(
    pool: &DbPool
) -> Result<DbConnection, PoolGetError>{
    let pool_clone = pool.clone();

    let res = spawn_blocking_with_tracing(move || {
        pool_clone.get()
    })
    .await??;

    Ok(res)
}

#[derive(Error)]
pub enum PoolGetError{
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("Failed to get connection from pool")]
    DbPoolError(#[from] r2d2::Error),
}

impl Debug for PoolGetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

/// Body of every non-validation error response.
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorDetail{
    pub detail: String
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self{
        Self{ detail: detail.into() }
    }
}

/// Flattens validator output into `{"field": ["message", ...]}`, nesting
/// objects for nested structs and index-keyed objects for lists.
pub fn validation_errors_json(errors: &ValidationErrors) -> Value{
    let mut body = Map::new();

    for (field, kind) in errors.errors() {
        let value = match kind {
            ValidationErrorsKind::Field(field_errors) => Value::Array(
                field_errors.iter()
                    .map(|e| {
                        let message = e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                        Value::String(message)
                    })
                    .collect()
            ),
            ValidationErrorsKind::Struct(inner) => validation_errors_json(inner),
            ValidationErrorsKind::List(entries) => Value::Object(
                entries.iter()
                    .map(|(index, inner)| (index.to_string(), validation_errors_json(inner)))
                    .collect()
            )
        };

        body.insert(field.to_string(), value);
    }

    Value::Object(body)
}

/// Records a hand-built field error alongside derive-generated ones.
pub fn add_field_error(errors: &mut ValidationErrors, field: &'static str, message: impl Into<Cow<'static, str>>){
    let mut error = ValidationError::new("invalid");
    error.message = Some(message.into());
    errors.add(field, error);
}

/// Escapes `%`, `_` and `\` so user input matches literally inside LIKE patterns.
pub fn escape_like(input: &str) -> String{
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

mod delete;
mod get;
mod post;
mod update;

pub use delete::*;
pub use get::*;
pub use post::*;
pub use update::*;

use std::{error::Error, fmt::Debug};

use actix_web::{http::{header, StatusCode}, HttpResponse, ResponseError};
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    db_interaction::orders::{OrderLine, OrderWriteError},
    domain::order_status::OrderStatus,
    filters::FilterError,
    utils::{add_field_error, error_fmt_chain, validation_errors_json, ErrorDetail, PoolGetError},
};

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct OrderItemPayload{
    /// Product id.
    pub product: i32,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub quantity: i32
}

impl From<&OrderItemPayload> for OrderLine {
    fn from(item: &OrderItemPayload) -> Self {
        Self{ product_id: item.product, quantity: item.quantity }
    }
}

/// Body of `POST /orders/`. The owner is always the caller.
#[derive(Deserialize, Debug, Clone, ToSchema)]
pub struct OrderCreate{
    #[serde(default)]
    pub status: Option<OrderStatus>,
    pub items: Vec<OrderItemPayload>
}

/// Body of `PUT`/`PATCH /orders/{order_id}/`. When `items` is present the
/// existing items are replaced.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
pub struct OrderUpdate{
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub items: Option<Vec<OrderItemPayload>>
}

#[derive(Validate)]
struct ItemList{
    #[validate(nested)]
    items: Vec<OrderItemPayload>
}

pub fn validate_items(items: &[OrderItemPayload]) -> Result<Vec<OrderLine>, ValidationErrors>{
    if items.is_empty() {
        let mut errors = ValidationErrors::new();
        add_field_error(&mut errors, "items", "This list may not be empty.");
        return Err(errors)
    }

    ItemList{ items: items.to_vec() }.validate()?;

    Ok(items.iter().map(OrderLine::from).collect())
}

#[derive(Error)]
pub enum OrderError{
    #[error("Invalid order data")]
    ValidationError(#[from] ValidationErrors),
    #[error(transparent)]
    FilterError(#[from] FilterError),
    #[error("No Order matches the given query.")]
    NotFound,
    #[error("{0}")]
    Rejected(String),
    #[error("User not found")]
    UnknownUser,
    #[error("Failed to get connection from pool")]
    PoolError(#[from] PoolGetError),
    #[error("unexpected error occured")]
    UnexpectedError(#[source] anyhow::Error)
}

impl Debug for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

impl From<anyhow::Error> for OrderError {
    fn from(e: anyhow::Error) -> Self {
        OrderError::UnexpectedError(e)
    }
}

impl From<OrderWriteError> for OrderError {
    fn from(e: OrderWriteError) -> Self {
        match e {
            OrderWriteError::NotFound => OrderError::NotFound,
            OrderWriteError::UnknownOwner => OrderError::UnknownUser,
            OrderWriteError::ProductNotFound(_)
            | OrderWriteError::InsufficientStock(_)
            | OrderWriteError::CancelledOrder => OrderError::Rejected(e.to_string()),
            other => OrderError::UnexpectedError(anyhow::Error::new(other))
        }
    }
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::ValidationError(_)
            | OrderError::FilterError(_)
            | OrderError::Rejected(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound => StatusCode::NOT_FOUND,
            OrderError::UnknownUser => StatusCode::UNAUTHORIZED,
            OrderError::PoolError(_) | OrderError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        match self {
            OrderError::ValidationError(errors) => HttpResponse::BadRequest()
                .json(validation_errors_json(errors)),
            OrderError::UnknownUser => HttpResponse::Unauthorized()
                .insert_header((header::WWW_AUTHENTICATE, r#"Bearer realm="api""#))
                .json(ErrorDetail::new(self.to_string())),
            OrderError::PoolError(_) | OrderError::UnexpectedError(_) => {
                tracing::error!("{:?}", self);
                HttpResponse::InternalServerError().json(ErrorDetail::new("A server error occurred."))
            },
            _ => HttpResponse::build(self.status_code()).json(ErrorDetail::new(self.to_string()))
        }
    }
}

mod delete;
mod get;
mod post;
mod update;

pub use delete::*;
pub use get::*;
pub use post::*;
pub use update::*;

use std::{borrow::Cow, error::Error, fmt::Debug};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    filters::FilterError,
    models::{NewProduct, ProductChanges},
    pagination::PaginationError,
    utils::{error_fmt_chain, validation_errors_json, ErrorDetail, PoolGetError},
};

// NUMERIC(10, 2)
const MAX_PRICE_SCALE: u32 = 2;
const MAX_PRICE_DIGITS: u32 = 10;

fn valid_price(price: &Decimal) -> Result<(), ValidationError>{
    let message = if *price <= Decimal::ZERO {
        "Price must be greater than 0"
    } else if price.normalize().scale() > MAX_PRICE_SCALE {
        "Ensure that there are no more than 2 decimal places."
    } else if price.trunc().to_string().len() as u32 > MAX_PRICE_DIGITS - MAX_PRICE_SCALE {
        "Ensure that there are no more than 10 digits in total."
    } else {
        return Ok(())
    };

    let mut error = ValidationError::new("price");
    error.message = Some(Cow::Borrowed(message));
    Err(error)
}

/// Body of `POST /products/` and `PUT /products/{id}/`.
#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct ProductPayload{
    #[validate(length(min = 1, max = 200, message = "Ensure this field has between 1 and 200 characters."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "valid_price"))]
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub stock: i32
}

impl From<ProductPayload> for NewProduct {
    fn from(payload: ProductPayload) -> Self {
        Self{
            name: payload.name,
            description: payload.description,
            price: payload.price,
            stock: payload.stock
        }
    }
}

/// Body of `PATCH /products/{id}/`; absent fields keep their current value.
/// Present fields go through the same checks as [`ProductPayload`].
#[derive(Deserialize, Debug, Clone, Default, Validate, ToSchema)]
pub struct ProductPatch{
    #[validate(length(min = 1, max = 200, message = "Ensure this field has between 1 and 200 characters."))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom(function = "valid_price"))]
    #[schema(value_type = Option<String>, example = "19.99")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub stock: Option<i32>
}

impl From<ProductPatch> for ProductChanges {
    fn from(patch: ProductPatch) -> Self {
        Self{
            name: patch.name,
            description: patch.description,
            price: patch.price,
            stock: patch.stock
        }
    }
}

#[derive(Error)]
pub enum ProductError{
    #[error("Invalid product data")]
    ValidationError(#[from] ValidationErrors),
    #[error(transparent)]
    FilterError(#[from] FilterError),
    #[error(transparent)]
    PaginationError(#[from] PaginationError),
    #[error("No Product matches the given query.")]
    NotFound,
    #[error("Failed to get connection from pool")]
    PoolError(#[from] PoolGetError),
    #[error("unexpected error occured")]
    UnexpectedError(#[from] anyhow::Error)
}

impl Debug for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

impl ResponseError for ProductError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProductError::ValidationError(_) | ProductError::FilterError(_) => StatusCode::BAD_REQUEST,
            ProductError::PaginationError(_) | ProductError::NotFound => StatusCode::NOT_FOUND,
            ProductError::PoolError(_) | ProductError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        match self {
            ProductError::ValidationError(errors) => HttpResponse::BadRequest()
                .json(validation_errors_json(errors)),
            ProductError::PoolError(_) | ProductError::UnexpectedError(_) => {
                tracing::error!("{:?}", self);
                HttpResponse::InternalServerError().json(ErrorDetail::new("A server error occurred."))
            },
            _ => HttpResponse::build(self.status_code()).json(ErrorDetail::new(self.to_string()))
        }
    }
}

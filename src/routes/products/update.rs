use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::{
    auth::extractors::AdminUser,
    cache::ResponseCache,
    db_interaction::products::{patch_product_in_db, update_product_in_db},
    models::ProductResponse,
    utils::{get_pooled_connection, DbPool},
};

use super::{ProductError, ProductPatch, ProductPayload};

#[utoipa::path(
    put,
    path = "/products/{id}/",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    request_body = ProductPayload,
    responses(
        (status = 200, body = ProductResponse),
        (status = 400, description = "Invalid product data"),
        (status = 404, description = "No such product")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Replacing product",
    skip(_admin, pool, cache)
)]
pub async fn put_product(
    _admin: AdminUser,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    path: web::Path<i32>,
    payload: web::Json<ProductPayload>
) -> Result<HttpResponse, ProductError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let conn = get_pooled_connection(&pool).await?;
    let product = update_product_in_db(conn, path.into_inner(), payload.into())
        .await?
        .ok_or(ProductError::NotFound)?;

    cache.invalidate_all();

    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

#[utoipa::path(
    patch,
    path = "/products/{id}/",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    request_body = ProductPatch,
    responses(
        (status = 200, body = ProductResponse),
        (status = 400, description = "Invalid product data"),
        (status = 404, description = "No such product")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Patching product",
    skip(_admin, pool, cache)
)]
pub async fn patch_product(
    _admin: AdminUser,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    path: web::Path<i32>,
    patch: web::Json<ProductPatch>
) -> Result<HttpResponse, ProductError> {
    let patch = patch.into_inner();
    patch.validate()?;

    let conn = get_pooled_connection(&pool).await?;
    let product = patch_product_in_db(conn, path.into_inner(), patch.into())
        .await?
        .ok_or(ProductError::NotFound)?;

    cache.invalidate_all();

    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

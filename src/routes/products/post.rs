use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::{
    auth::extractors::AdminUser,
    cache::ResponseCache,
    db_interaction::products::insert_product_into_db,
    models::ProductResponse,
    utils::{get_pooled_connection, DbPool},
};

use super::{ProductError, ProductPayload};

#[utoipa::path(
    post,
    path = "/products/",
    tag = "products",
    request_body = ProductPayload,
    responses(
        (status = 201, body = ProductResponse),
        (status = 400, description = "Invalid product data"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Posting product",
    skip(_admin, pool, cache)
)]
pub async fn post_product(
    _admin: AdminUser,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    payload: web::Json<ProductPayload>
) -> Result<HttpResponse, ProductError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let conn = get_pooled_connection(&pool).await?;
    let product = insert_product_into_db(conn, payload.into()).await?;

    cache.invalidate_all();

    Ok(HttpResponse::Created().json(ProductResponse::from(product)))
}

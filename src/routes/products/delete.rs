use actix_web::{web, HttpResponse};

use crate::{
    auth::extractors::AdminUser,
    cache::ResponseCache,
    db_interaction::products::delete_product_from_db,
    utils::{get_pooled_connection, DbPool},
};

use super::ProductError;

#[utoipa::path(
    delete,
    path = "/products/{id}/",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such product")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Deleting product",
    skip(_admin, pool, cache)
)]
pub async fn delete_product(
    _admin: AdminUser,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    path: web::Path<i32>
) -> Result<HttpResponse, ProductError> {
    let conn = get_pooled_connection(&pool).await?;

    if !delete_product_from_db(conn, path.into_inner()).await? {
        return Err(ProductError::NotFound)
    }

    cache.invalidate_all();

    Ok(HttpResponse::NoContent().finish())
}

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::{
    auth::extractors::Authenticated,
    cache::ResponseCache,
    db_interaction::orders::{update_order_in_db, OrderChanges, OrderScope},
    models::OrderWithItems,
    utils::{get_pooled_connection, DbPool},
};

use super::{validate_items, OrderError, OrderUpdate};

async fn apply_order_update(
    user: &Authenticated,
    pool: &DbPool,
    cache: &ResponseCache,
    order_id: Uuid,
    update: OrderUpdate
) -> Result<HttpResponse, OrderError> {
    let items = update.items
        .as_deref()
        .map(validate_items)
        .transpose()?;

    let scope = OrderScope::for_caller(user.user_id(), user.is_admin());
    let changes = OrderChanges{ status: update.status, items };

    let conn = get_pooled_connection(pool).await?;
    let updated = update_order_in_db(conn, scope, order_id, changes).await?;

    // Item and status changes both move stock
    cache.invalidate_all();

    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    put,
    path = "/orders/{order_id}/",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order id")),
    request_body = OrderUpdate,
    responses(
        (status = 200, body = OrderWithItems),
        (status = 400, description = "Invalid items, not enough stock or order already cancelled"),
        (status = 404, description = "No such order, or it belongs to someone else")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Replacing order",
    skip(user, pool, cache),
    fields(user_id = %user.user_id())
)]
pub async fn put_order(
    user: Authenticated,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    path: web::Path<Uuid>,
    update: web::Json<OrderUpdate>
) -> Result<HttpResponse, OrderError> {
    apply_order_update(&user, &pool, &cache, path.into_inner(), update.into_inner()).await
}

#[utoipa::path(
    patch,
    path = "/orders/{order_id}/",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order id")),
    request_body = OrderUpdate,
    responses(
        (status = 200, body = OrderWithItems),
        (status = 400, description = "Invalid items, not enough stock or order already cancelled"),
        (status = 404, description = "No such order, or it belongs to someone else")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Patching order",
    skip(user, pool, cache),
    fields(user_id = %user.user_id())
)]
pub async fn patch_order(
    user: Authenticated,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    path: web::Path<Uuid>,
    update: web::Json<OrderUpdate>
) -> Result<HttpResponse, OrderError> {
    apply_order_update(&user, &pool, &cache, path.into_inner(), update.into_inner()).await
}

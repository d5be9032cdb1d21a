use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::{
    auth::extractors::Authenticated,
    cache::ResponseCache,
    db_interaction::orders::{delete_order_from_db, OrderScope},
    utils::{get_pooled_connection, DbPool},
};

use super::OrderError;

#[utoipa::path(
    delete,
    path = "/orders/{order_id}/",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Deleted, reserved stock released"),
        (status = 404, description = "No such order, or it belongs to someone else")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Deleting order",
    skip(user, pool, cache),
    fields(user_id = %user.user_id())
)]
pub async fn delete_order(
    user: Authenticated,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    path: web::Path<Uuid>
) -> Result<HttpResponse, OrderError> {
    let scope = OrderScope::for_caller(user.user_id(), user.is_admin());

    let conn = get_pooled_connection(&pool).await?;
    delete_order_from_db(conn, scope, path.into_inner()).await?;

    cache.invalidate_all();

    Ok(HttpResponse::NoContent().finish())
}

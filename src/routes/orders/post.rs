use actix_web::{web, HttpResponse};

use crate::{
    auth::extractors::Authenticated,
    cache::{CachePrefix, ResponseCache},
    db_interaction::orders::create_order_and_reserve_stock,
    domain::user_email::UserEmail,
    models::OrderWithItems,
    tasks::{Task, TaskQueue},
    utils::{get_pooled_connection, DbPool},
};

use super::{validate_items, OrderCreate, OrderError};

#[utoipa::path(
    post,
    path = "/orders/",
    tag = "orders",
    request_body = OrderCreate,
    responses(
        (status = 201, body = OrderWithItems),
        (status = 400, description = "Invalid items or not enough stock"),
        (status = 401, description = "Not authenticated")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Posting order",
    skip(user, pool, cache, tasks),
    fields(user_id = %user.user_id())
)]
pub async fn post_order(
    user: Authenticated,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    tasks: web::Data<TaskQueue>,
    order: web::Json<OrderCreate>
) -> Result<HttpResponse, OrderError> {
    let order = order.into_inner();
    let lines = validate_items(&order.items)?;

    let conn = get_pooled_connection(&pool).await?;
    let created = create_order_and_reserve_stock(
        conn,
        user.user_id(),
        order.status.unwrap_or_default(),
        lines
    ).await?;

    cache.invalidate(CachePrefix::Orders);
    // Stock changed, so cached product pages are stale too
    cache.invalidate(CachePrefix::ProductList);
    cache.invalidate(CachePrefix::ProductInfo);

    match UserEmail::parse(user.0.email.clone()) {
        Ok(recipient) => tasks.dispatch(Task::SendOrderConfirmation{
            order_id: created.order_id,
            recipient,
            username: user.0.username.clone(),
            total_price: created.total_price
        }),
        Err(e) => tracing::warn!(error = %e, "Skipping order confirmation")
    }

    Ok(HttpResponse::Created().json(created))
}

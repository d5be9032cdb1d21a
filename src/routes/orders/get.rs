use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;
use uuid::Uuid;

use crate::{
    auth::extractors::Authenticated,
    cache::{cached_json, CachePrefix, ResponseCache},
    configuration::PaginationSettings,
    db_interaction::orders::{get_order_from_db, get_order_items_from_db, get_orders_from_db, OrderScope},
    filters::OrderFilterQuery,
    models::{OrderItemResponse, OrderWithItems},
    pagination::{LimitOffsetPagination, LimitOffsetQuery, Page},
    utils::{get_pooled_connection, DbPool},
};

use super::OrderError;

async fn order_page(
    req: &HttpRequest,
    pool: &DbPool,
    pagination_settings: &PaginationSettings,
    scope: OrderScope,
    filter: &OrderFilterQuery,
    page: &LimitOffsetQuery
) -> Result<Page<OrderWithItems>, OrderError> {
    let filter = filter.parse()?;
    let pagination = LimitOffsetPagination::resolve(page, pagination_settings);

    let conn = get_pooled_connection(pool).await?;
    let (count, orders) = get_orders_from_db(conn, scope, filter, pagination.limit, pagination.offset).await?;

    Ok(pagination.paginate(req, count, orders))
}

#[utoipa::path(
    get,
    path = "/orders/",
    tag = "orders",
    params(OrderFilterQuery, LimitOffsetQuery),
    responses(
        (status = 200, description = "Orders visible to the caller", body = Page<OrderWithItems>),
        (status = 401, description = "Not authenticated")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Get order list",
    skip(req, user, pool, cache, pagination_settings),
    fields(user_id = %user.user_id())
)]
pub async fn get_orders(
    req: HttpRequest,
    user: Authenticated,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    pagination_settings: web::Data<PaginationSettings>,
    filter: web::Query<OrderFilterQuery>,
    page: web::Query<LimitOffsetQuery>
) -> Result<HttpResponse, OrderError> {
    let vary = user.user_id().to_string();
    let key = cache.key(CachePrefix::Orders, &req, Some(&vary));
    if let Some(body) = cache.get(&key).await {
        return Ok(cached_json(&body, true))
    }

    let scope = OrderScope::for_caller(user.user_id(), user.is_admin());
    let page = order_page(&req, &pool, &pagination_settings, scope, &filter, &page).await?;

    let body = serde_json::to_string(&page).context("Failed to serialize order page")?;
    cache.insert(key, body.clone()).await;

    Ok(cached_json(&body, false))
}

#[utoipa::path(
    get,
    path = "/user-orders/",
    tag = "orders",
    params(OrderFilterQuery, LimitOffsetQuery),
    responses(
        (status = 200, description = "The caller's own orders", body = Page<OrderWithItems>),
        (status = 401, description = "Not authenticated")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Get orders of the current user",
    skip(req, user, pool, pagination_settings),
    fields(user_id = %user.user_id())
)]
pub async fn get_user_orders(
    req: HttpRequest,
    user: Authenticated,
    pool: web::Data<DbPool>,
    pagination_settings: web::Data<PaginationSettings>,
    filter: web::Query<OrderFilterQuery>,
    page: web::Query<LimitOffsetQuery>
) -> Result<HttpResponse, OrderError> {
    // Admins included: this view never widens past the caller
    let scope = OrderScope::Owner(user.user_id());
    let page = order_page(&req, &pool, &pagination_settings, scope, &filter, &page).await?;

    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}/",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, body = OrderWithItems),
        (status = 404, description = "No such order, or it belongs to someone else")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Get order detail",
    skip(user, pool),
    fields(user_id = %user.user_id())
)]
pub async fn get_order(
    user: Authenticated,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>
) -> Result<HttpResponse, OrderError> {
    let scope = OrderScope::for_caller(user.user_id(), user.is_admin());

    let conn = get_pooled_connection(&pool).await?;
    let order = get_order_from_db(conn, scope, path.into_inner())
        .await?
        .ok_or(OrderError::NotFound)?;

    Ok(HttpResponse::Ok().json(order))
}

#[utoipa::path(
    get,
    path = "/order-items/",
    tag = "orders",
    params(LimitOffsetQuery),
    responses(
        (status = 200, description = "Order items visible to the caller", body = Page<OrderItemResponse>),
        (status = 401, description = "Not authenticated")
    ),
    security(("jwt" = []))
)]
#[tracing::instrument(
    "Get order items",
    skip(req, user, pool, pagination_settings),
    fields(user_id = %user.user_id())
)]
pub async fn get_order_items(
    req: HttpRequest,
    user: Authenticated,
    pool: web::Data<DbPool>,
    pagination_settings: web::Data<PaginationSettings>,
    page: web::Query<LimitOffsetQuery>
) -> Result<HttpResponse, OrderError> {
    let scope = OrderScope::for_caller(user.user_id(), user.is_admin());
    let pagination = LimitOffsetPagination::resolve(&page, &pagination_settings);

    let conn = get_pooled_connection(&pool).await?;
    let (count, items) = get_order_items_from_db(conn, scope, pagination.limit, pagination.offset).await?;

    Ok(HttpResponse::Ok().json(pagination.paginate(&req, count, items)))
}

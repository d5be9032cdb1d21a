use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;

use crate::{
    cache::{cached_json, CachePrefix, ResponseCache},
    configuration::PaginationSettings,
    db_interaction::products::{get_product_from_db, get_products_from_db, get_products_info_from_db},
    filters::ProductFilterQuery,
    models::{ProductResponse, ProductsInfo},
    pagination::{Page, PageNumberPagination, PageNumberQuery},
    utils::{get_pooled_connection, DbPool},
};

use super::ProductError;

#[utoipa::path(
    get,
    path = "/products/",
    tag = "products",
    params(ProductFilterQuery, PageNumberQuery),
    responses(
        (status = 200, description = "Page of products", body = Page<ProductResponse>),
        (status = 400, description = "Malformed filter"),
        (status = 404, description = "Invalid page")
    )
)]
#[tracing::instrument(
    "Get product list",
    skip(req, pool, cache, pagination_settings)
)]
pub async fn get_products(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>,
    pagination_settings: web::Data<PaginationSettings>,
    filter: web::Query<ProductFilterQuery>,
    page: web::Query<PageNumberQuery>
) -> Result<HttpResponse, ProductError> {
    let key = cache.key(CachePrefix::ProductList, &req, None);
    if let Some(body) = cache.get(&key).await {
        return Ok(cached_json(&body, true))
    }

    let filter = filter.parse()?;
    let pagination = PageNumberPagination::resolve(&page, &pagination_settings)?;

    let conn = get_pooled_connection(&pool).await?;
    let (count, products) = get_products_from_db(conn, filter, pagination.limit(), pagination.offset()).await?;

    let page = pagination.paginate(
        &req,
        count,
        products.into_iter().map(ProductResponse::from).collect()
    )?;

    let body = serde_json::to_string(&page).context("Failed to serialize product page")?;
    cache.insert(key, body.clone()).await;

    Ok(cached_json(&body, false))
}

#[utoipa::path(
    get,
    path = "/products/{id}/",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, body = ProductResponse),
        (status = 404, description = "No such product")
    )
)]
#[tracing::instrument(
    "Get product detail",
    skip(pool)
)]
pub async fn get_product(
    pool: web::Data<DbPool>,
    path: web::Path<i32>
) -> Result<HttpResponse, ProductError> {
    let conn = get_pooled_connection(&pool).await?;
    let product = get_product_from_db(conn, path.into_inner())
        .await?
        .ok_or(ProductError::NotFound)?;

    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

#[utoipa::path(
    get,
    path = "/products/info/",
    tag = "products",
    responses((status = 200, body = ProductsInfo))
)]
#[tracing::instrument(
    "Get product aggregates",
    skip(req, pool, cache)
)]
pub async fn get_products_info(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    cache: web::Data<ResponseCache>
) -> Result<HttpResponse, ProductError> {
    let key = cache.key(CachePrefix::ProductInfo, &req, None);
    if let Some(body) = cache.get(&key).await {
        return Ok(cached_json(&body, true))
    }

    let conn = get_pooled_connection(&pool).await?;
    let aggregates = get_products_info_from_db(conn).await?;

    let info = ProductsInfo{
        products: aggregates.products.into_iter().map(ProductResponse::from).collect(),
        count: aggregates.count,
        max_price: aggregates.max_price,
        min_price: aggregates.min_price
    };

    let body = serde_json::to_string(&info).context("Failed to serialize product info")?;
    cache.insert(key, body.clone()).await;

    Ok(cached_json(&body, false))
}

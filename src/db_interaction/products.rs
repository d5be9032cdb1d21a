use anyhow::Context;
use diesel::{
    dsl::{count_star, max, min},
    pg::Pg,
    BoolExpressionMethods, ExpressionMethods, OptionalExtension, PgTextExpressionMethods, QueryDsl, RunQueryDsl,
};
use rust_decimal::Decimal;

use crate::{
    filters::{ProductFilter, ProductOrderField},
    models::{NewProduct, Product, ProductChanges},
    schema::products,
    telemetry::spawn_blocking_with_tracing,
    utils::{escape_like, DbConnection},
};

fn filtered_products(filter: &ProductFilter) -> products::BoxedQuery<'static, Pg>{
    let mut query = products::table.into_boxed();

    if filter.in_stock_only {
        query = query.filter(products::stock.gt(0));
    }

    if let Some(name) = &filter.name_iexact {
        query = query.filter(products::name.ilike(escape_like(name)));
    }

    if let Some(name) = &filter.name_icontains {
        query = query.filter(products::name.ilike(format!("%{}%", escape_like(name))));
    }

    if let Some(price) = filter.price_exact {
        query = query.filter(products::price.eq(price));
    }

    if let Some(price) = filter.price_lt {
        query = query.filter(products::price.lt(price));
    }

    if let Some(price) = filter.price_gt {
        query = query.filter(products::price.gt(price));
    }

    if let Some((low, high)) = filter.price_range {
        query = query.filter(products::price.between(low, high));
    }

    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            products::name.ilike(pattern.clone())
                .or(products::description.ilike(pattern))
        );
    }

    query
}

fn ordered(query: products::BoxedQuery<'static, Pg>, filter: &ProductFilter) -> products::BoxedQuery<'static, Pg>{
    let descending = filter.ordering.descending;

    // id breaks ties so pages stay stable
    match (filter.ordering.field, descending) {
        (ProductOrderField::Id, false) => query.order_by(products::id.asc()),
        (ProductOrderField::Id, true) => query.order_by(products::id.desc()),
        (ProductOrderField::Name, false) => query.order_by((products::name.asc(), products::id.asc())),
        (ProductOrderField::Name, true) => query.order_by((products::name.desc(), products::id.asc())),
        (ProductOrderField::Price, false) => query.order_by((products::price.asc(), products::id.asc())),
        (ProductOrderField::Price, true) => query.order_by((products::price.desc(), products::id.asc())),
        (ProductOrderField::Stock, false) => query.order_by((products::stock.asc(), products::id.asc())),
        (ProductOrderField::Stock, true) => query.order_by((products::stock.desc(), products::id.asc()))
    }
}

#[tracing::instrument(
    "Getting products from db",
    skip(conn)
)]
pub async fn get_products_from_db(
    mut conn: DbConnection,
    filter: ProductFilter,
    limit: i64,
    offset: i64
) -> Result<(i64, Vec<Product>), anyhow::Error> {
    spawn_blocking_with_tracing(move || -> Result<(i64, Vec<Product>), anyhow::Error> {
        let count = filtered_products(&filter)
            .count()
            .get_result::<i64>(&mut conn)
            .context("Failed to count products")?;

        let products = ordered(filtered_products(&filter), &filter)
            .limit(limit)
            .offset(offset)
            .load::<Product>(&mut conn)
            .context("Failed to get products")?;

        Ok((count, products))
    })
    .await
    .context("Failed due to threadpool error")?
}

#[tracing::instrument(
    "Getting product from db",
    skip(conn)
)]
pub async fn get_product_from_db(
    mut conn: DbConnection,
    product_id: i32
) -> Result<Option<Product>, anyhow::Error> {
    spawn_blocking_with_tracing(move || {
        products::table
            .find(product_id)
            .first::<Product>(&mut conn)
            .optional()
            .context("Failed to get product")
    })
    .await
    .context("Failed due to threadpool error")?
}

#[tracing::instrument(
    "Inserting product into db",
    skip(conn)
)]
pub async fn insert_product_into_db(
    mut conn: DbConnection,
    product: NewProduct
) -> Result<Product, anyhow::Error> {
    spawn_blocking_with_tracing(move || {
        diesel::insert_into(products::table)
            .values(&product)
            .get_result::<Product>(&mut conn)
            .context("Failed to insert product")
    })
    .await
    .context("Failed due to threadpool error")?
}

/// Overwrites every column; `None` when the product does not exist.
#[tracing::instrument(
    "Updating product in db",
    skip(conn)
)]
pub async fn update_product_in_db(
    mut conn: DbConnection,
    product_id: i32,
    product: NewProduct
) -> Result<Option<Product>, anyhow::Error> {
    spawn_blocking_with_tracing(move || {
        diesel::update(products::table.find(product_id))
            .set(&product)
            .get_result::<Product>(&mut conn)
            .optional()
            .context("Failed to update product")
    })
    .await
    .context("Failed due to threadpool error")?
}

/// Sets only the columns present in `changes`, so concurrent stock
/// reservations survive a PATCH that does not mention stock.
#[tracing::instrument(
    "Patching product in db",
    skip(conn)
)]
pub async fn patch_product_in_db(
    mut conn: DbConnection,
    product_id: i32,
    changes: ProductChanges
) -> Result<Option<Product>, anyhow::Error> {
    spawn_blocking_with_tracing(move || {
        if changes.is_empty() {
            return products::table
                .find(product_id)
                .first::<Product>(&mut conn)
                .optional()
                .context("Failed to get product")
        }

        diesel::update(products::table.find(product_id))
            .set(&changes)
            .get_result::<Product>(&mut conn)
            .optional()
            .context("Failed to patch product")
    })
    .await
    .context("Failed due to threadpool error")?
}

/// `false` when there was nothing to delete.
#[tracing::instrument(
    "Deleting product from db",
    skip(conn)
)]
pub async fn delete_product_from_db(
    mut conn: DbConnection,
    product_id: i32
) -> Result<bool, anyhow::Error> {
    let deleted = spawn_blocking_with_tracing(move || {
        diesel::delete(products::table.find(product_id))
            .execute(&mut conn)
            .context("Failed to delete product")
    })
    .await
    .context("Failed due to threadpool error")??;

    Ok(deleted > 0)
}

pub struct ProductAggregates{
    pub products: Vec<Product>,
    pub count: i64,
    pub max_price: Option<Decimal>,
    pub min_price: Option<Decimal>
}

#[tracing::instrument(
    "Getting product aggregates from db",
    skip(conn)
)]
pub async fn get_products_info_from_db(
    mut conn: DbConnection
) -> Result<ProductAggregates, anyhow::Error> {
    spawn_blocking_with_tracing(move || -> Result<ProductAggregates, anyhow::Error> {
        let (count, max_price, min_price) = products::table
            .select((count_star(), max(products::price), min(products::price)))
            .get_result::<(i64, Option<Decimal>, Option<Decimal>)>(&mut conn)
            .context("Failed to aggregate product prices")?;

        let products = products::table
            .order_by(products::id.asc())
            .load::<Product>(&mut conn)
            .context("Failed to get products")?;

        Ok(ProductAggregates{ products, count, max_price, min_price })
    })
    .await
    .context("Failed due to threadpool error")?
}

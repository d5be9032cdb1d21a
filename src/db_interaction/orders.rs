use std::{collections::HashMap, error::Error, fmt::Debug};

use anyhow::Context;
use chrono::Utc;
use diesel::{pg::Pg, result::DatabaseErrorKind, BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::order_status::OrderStatus,
    filters::OrderFilter,
    models::{NewOrderItem, Order, OrderItemResponse, OrderWithItems},
    schema::{order_items, orders, products},
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

/// Which orders a caller may see: admins see every order, everyone else only their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope{
    All,
    Owner(Uuid)
}

impl OrderScope {
    pub fn for_caller(user_id: Uuid, is_admin: bool) -> Self{
        if is_admin {
            OrderScope::All
        } else {
            OrderScope::Owner(user_id)
        }
    }

    pub fn permits(&self, order: &Order) -> bool {
        match self {
            OrderScope::All => true,
            OrderScope::Owner(user_id) => order.user_id == *user_id
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine{
    pub product_id: i32,
    pub quantity: i32
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges{
    pub status: Option<OrderStatus>,
    pub items: Option<Vec<OrderLine>>
}

// Errors associated with writing orders and reserving stock
#[derive(Error)]
pub enum OrderWriteError{
    #[error("Tokio threadpool error occured")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("Failed to run query")]
    QueryError(#[from] diesel::result::Error),
    #[error("Not found.")]
    NotFound,
    #[error("Invalid pk \"{0}\" - object does not exist.")]
    ProductNotFound(i32),
    #[error("Not enough stock for product {0}.")]
    InsufficientStock(i32),
    #[error("A cancelled order cannot be changed.")]
    CancelledOrder,
    #[error("User not found")]
    UnknownOwner,
    #[error("unexpected error occured")]
    UnexpectedError(#[from] anyhow::Error)
}

impl Debug for OrderWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// The owner comes from a token and may have been deleted since it was issued
fn order_insert_error(e: diesel::result::Error) -> OrderWriteError{
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => OrderWriteError::UnknownOwner,
        e => OrderWriteError::QueryError(e)
    }
}

fn filtered_orders(scope: OrderScope, filter: &OrderFilter) -> orders::BoxedQuery<'static, Pg>{
    let mut query = orders::table.into_boxed();

    if let OrderScope::Owner(user_id) = scope {
        query = query.filter(orders::user_id.eq(user_id));
    }

    if let Some(status) = filter.status {
        query = query.filter(orders::status.eq(status.as_str()));
    }

    if let Some(from) = filter.created_from {
        query = query.filter(orders::created_at.ge(from));
    }

    if let Some(until) = filter.created_until {
        query = query.filter(orders::created_at.lt(until));
    }

    query
}

fn parse_status(order: &Order) -> Result<OrderStatus, anyhow::Error>{
    order.status.parse::<OrderStatus>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Order {} has an unknown status", order.order_id))
}

/// Attaches items to each order, keeping the order of `orders`.
fn with_items(conn: &mut DbConnection, orders: Vec<Order>) -> Result<Vec<OrderWithItems>, anyhow::Error>{
    let ids: Vec<Uuid> = orders.iter().map(|order| order.order_id).collect();

    let rows = order_items::table
        .inner_join(products::table)
        .filter(order_items::order_id.eq_any(ids))
        .order_by(order_items::id.asc())
        .select((order_items::order_id, products::name, products::price, order_items::quantity))
        .load::<(Uuid, String, Decimal, i32)>(conn)
        .context("Failed to get order items")?;

    let mut grouped: HashMap<Uuid, Vec<OrderItemResponse>> = HashMap::new();
    for (order_id, name, price, quantity) in rows {
        grouped.entry(order_id)
            .or_default()
            .push(OrderItemResponse::new(name, price, quantity));
    }

    orders.into_iter()
        .map(|order| {
            let status = parse_status(&order)?;
            let items = grouped.remove(&order.order_id).unwrap_or_default();
            Ok(OrderWithItems::new(order, status, items))
        })
        .collect()
}

fn load_order(conn: &mut DbConnection, order_id: Uuid) -> Result<OrderWithItems, OrderWriteError>{
    let order = orders::table
        .find(order_id)
        .first::<Order>(conn)?;

    with_items(conn, vec![order])?
        .pop()
        .ok_or(OrderWriteError::NotFound)
}

// Row lock so concurrent writers to the same order serialize
fn lock_order(conn: &mut DbConnection, scope: OrderScope, order_id: Uuid) -> Result<Order, OrderWriteError>{
    orders::table
        .find(order_id)
        .for_update()
        .first::<Order>(conn)
        .optional()?
        .filter(|order| scope.permits(order))
        .ok_or(OrderWriteError::NotFound)
}

fn product_exists(conn: &mut DbConnection, product_id: i32) -> Result<bool, diesel::result::Error>{
    Ok(products::table
        .find(product_id)
        .select(products::id)
        .first::<i32>(conn)
        .optional()?
        .is_some())
}

fn check_products(conn: &mut DbConnection, lines: &[OrderLine]) -> Result<(), OrderWriteError>{
    for line in lines {
        if !product_exists(conn, line.product_id)? {
            return Err(OrderWriteError::ProductNotFound(line.product_id))
        }
    }

    Ok(())
}

// Conditional decrement; any shortfall aborts the surrounding transaction
fn reserve_stock(conn: &mut DbConnection, lines: &[OrderLine]) -> Result<(), OrderWriteError>{
    for line in lines {
        let affected_rows = diesel::update(
                products::table.filter(
                    products::id.eq(line.product_id)
                        .and(products::stock.ge(line.quantity))
                )
            )
            .set(products::stock.eq(products::stock - line.quantity))
            .execute(conn)?;

        if affected_rows == 0 {
            return Err(if product_exists(conn, line.product_id)? {
                OrderWriteError::InsufficientStock(line.product_id)
            } else {
                OrderWriteError::ProductNotFound(line.product_id)
            })
        }
    }

    Ok(())
}

fn release_stock(conn: &mut DbConnection, order_id: Uuid) -> Result<(), OrderWriteError>{
    let reserved = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select((order_items::product_id, order_items::quantity))
        .load::<(i32, i32)>(conn)?;

    for (product_id, quantity) in reserved {
        diesel::update(products::table.find(product_id))
            .set(products::stock.eq(products::stock + quantity))
            .execute(conn)?;
    }

    Ok(())
}

fn insert_items(conn: &mut DbConnection, order_id: Uuid, lines: &[OrderLine]) -> Result<(), OrderWriteError>{
    let items: Vec<NewOrderItem> = lines.iter()
        .map(|line| NewOrderItem{
            order_id,
            product_id: line.product_id,
            quantity: line.quantity
        })
        .collect();

    diesel::insert_into(order_items::table)
        .values(&items)
        .execute(conn)?;

    Ok(())
}

#[tracing::instrument(
    "Getting orders with items from db",
    skip(conn)
)]
pub async fn get_orders_from_db(
    mut conn: DbConnection,
    scope: OrderScope,
    filter: OrderFilter,
    limit: i64,
    offset: i64
) -> Result<(i64, Vec<OrderWithItems>), anyhow::Error> {
    spawn_blocking_with_tracing(move || -> Result<(i64, Vec<OrderWithItems>), anyhow::Error> {
        let count = filtered_orders(scope, &filter)
            .count()
            .get_result::<i64>(&mut conn)
            .context("Failed to count orders")?;

        let orders = filtered_orders(scope, &filter)
            .order_by((orders::created_at.desc(), orders::order_id.asc()))
            .limit(limit)
            .offset(offset)
            .load::<Order>(&mut conn)
            .context("Failed to load orders")?;

        Ok((count, with_items(&mut conn, orders)?))
    })
    .await
    .context("Failed due to threadpool error")?
}

#[tracing::instrument(
    "Getting order with items from db",
    skip(conn)
)]
pub async fn get_order_from_db(
    mut conn: DbConnection,
    scope: OrderScope,
    order_id: Uuid
) -> Result<Option<OrderWithItems>, anyhow::Error> {
    spawn_blocking_with_tracing(move || -> Result<Option<OrderWithItems>, anyhow::Error> {
        let order = orders::table
            .find(order_id)
            .first::<Order>(&mut conn)
            .optional()
            .context("Failed to load order")?
            .filter(|order| scope.permits(order));

        match order {
            Some(order) => Ok(with_items(&mut conn, vec![order])?.pop()),
            None => Ok(None)
        }
    })
    .await
    .context("Failed due to threadpool error")?
}

#[tracing::instrument(
    "Creating order and reserving stock",
    skip(conn)
)]
pub async fn create_order_and_reserve_stock(
    mut conn: DbConnection,
    user_id: Uuid,
    status: OrderStatus,
    lines: Vec<OrderLine>
) -> Result<OrderWithItems, OrderWriteError> {
    let created = spawn_blocking_with_tracing(move || {
        conn.transaction::<OrderWithItems, OrderWriteError, _>(|conn| {
            if status == OrderStatus::Cancelled {
                check_products(conn, &lines)?;
            } else {
                reserve_stock(conn, &lines)?;
            }

            let order = Order{
                order_id: Uuid::new_v4(),
                user_id,
                created_at: Utc::now(),
                status: status.as_str().to_string()
            };

            diesel::insert_into(orders::table)
                .values(&order)
                .execute(conn)
                .map_err(order_insert_error)?;

            insert_items(conn, order.order_id, &lines)?;

            load_order(conn, order.order_id)
        })
    })
    .await??;

    Ok(created)
}

#[tracing::instrument(
    "Updating order",
    skip(conn)
)]
pub async fn update_order_in_db(
    mut conn: DbConnection,
    scope: OrderScope,
    order_id: Uuid,
    changes: OrderChanges
) -> Result<OrderWithItems, OrderWriteError> {
    let updated = spawn_blocking_with_tracing(move || {
        conn.transaction::<OrderWithItems, OrderWriteError, _>(|conn| {
            let order = lock_order(conn, scope, order_id)?;
            let current = parse_status(&order)?;
            let next = changes.status.unwrap_or(current);

            if current == OrderStatus::Cancelled && (next != current || changes.items.is_some()) {
                return Err(OrderWriteError::CancelledOrder)
            }

            match &changes.items {
                Some(lines) => {
                    if current != OrderStatus::Cancelled {
                        release_stock(conn, order_id)?;
                    }

                    diesel::delete(order_items::table.filter(order_items::order_id.eq(order_id)))
                        .execute(conn)?;

                    if next == OrderStatus::Cancelled {
                        check_products(conn, lines)?;
                    } else {
                        reserve_stock(conn, lines)?;
                    }

                    insert_items(conn, order_id, lines)?;
                },
                None if next == OrderStatus::Cancelled && current != OrderStatus::Cancelled => {
                    release_stock(conn, order_id)?;
                },
                None => {}
            }

            diesel::update(orders::table.find(order_id))
                .set(orders::status.eq(next.as_str()))
                .execute(conn)?;

            load_order(conn, order_id)
        })
    })
    .await??;

    Ok(updated)
}

#[tracing::instrument(
    "Deleting order",
    skip(conn)
)]
pub async fn delete_order_from_db(
    mut conn: DbConnection,
    scope: OrderScope,
    order_id: Uuid
) -> Result<(), OrderWriteError> {
    spawn_blocking_with_tracing(move || {
        conn.transaction::<(), OrderWriteError, _>(|conn| {
            let order = lock_order(conn, scope, order_id)?;

            if parse_status(&order)? != OrderStatus::Cancelled {
                release_stock(conn, order_id)?;
            }

            diesel::delete(orders::table.find(order_id))
                .execute(conn)?;

            Ok(())
        })
    })
    .await??;

    Ok(())
}

#[tracing::instrument(
    "Getting order items from db",
    skip(conn)
)]
pub async fn get_order_items_from_db(
    mut conn: DbConnection,
    scope: OrderScope,
    limit: i64,
    offset: i64
) -> Result<(i64, Vec<OrderItemResponse>), anyhow::Error> {
    spawn_blocking_with_tracing(move || -> Result<(i64, Vec<OrderItemResponse>), anyhow::Error> {
        let mut count_query = order_items::table
            .inner_join(orders::table)
            .into_boxed();

        let mut query = order_items::table
            .inner_join(orders::table)
            .inner_join(products::table)
            .select((products::name, products::price, order_items::quantity))
            .order_by(order_items::id.asc())
            .into_boxed();

        if let OrderScope::Owner(user_id) = scope {
            count_query = count_query.filter(orders::user_id.eq(user_id));
            query = query.filter(orders::user_id.eq(user_id));
        }

        let count = count_query
            .count()
            .get_result::<i64>(&mut conn)
            .context("Failed to count order items")?;

        let items = query
            .limit(limit)
            .offset(offset)
            .load::<(String, Decimal, i32)>(&mut conn)
            .context("Failed to load order items")?
            .into_iter()
            .map(|(name, price, quantity)| OrderItemResponse::new(name, price, quantity))
            .collect();

        Ok((count, items))
    })
    .await
    .context("Failed due to threadpool error")?
}

use chrono::{DateTime, Utc};
use diesel::prelude::{AsChangeset, Insertable, Queryable, Selectable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::order_status::OrderStatus;
use crate::schema::{order_items, orders, products, users};

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = users)]
pub struct User{
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = products)]
pub struct Product{
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

// Used both for inserts and for full-row updates
#[derive(Insertable, AsChangeset, Clone, Debug)]
#[diesel(table_name = products)]
pub struct NewProduct{
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32
}

// `None` fields are left out of the UPDATE
#[derive(AsChangeset, Clone, Debug, Default, PartialEq)]
#[diesel(table_name = products)]
pub struct ProductChanges{
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.price.is_none() && self.stock.is_none()
    }
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = orders)]
pub struct Order{
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: String
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = order_items)]
pub struct NewOrderItem{
    pub order_id: Uuid,
    pub product_id: i32,
    pub quantity: i32
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ProductResponse{
    pub id: i32,
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    pub stock: i32,
    pub in_stock: bool
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        let in_stock = product.in_stock();
        Self{
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            in_stock
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ProductsInfo{
    pub products: Vec<ProductResponse>,
    pub count: i64,
    #[schema(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub min_price: Option<Decimal>
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct OrderItemResponse{
    pub product_name: String,
    #[schema(value_type = String)]
    pub product_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub item_subtotal: Decimal
}

impl OrderItemResponse {
    pub fn new(product_name: String, product_price: Decimal, quantity: i32) -> Self{
        Self{
            product_name,
            product_price,
            quantity,
            item_subtotal: product_price * Decimal::from(quantity)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct OrderWithItems{
    pub order_id: Uuid,
    pub user: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    #[schema(value_type = String)]
    pub total_price: Decimal
}

impl OrderWithItems {
    pub fn new(order: Order, status: OrderStatus, items: Vec<OrderItemResponse>) -> Self{
        let total_price = items.iter().map(|item| item.item_subtotal).sum();
        Self{
            order_id: order.order_id,
            user: order.user_id,
            created_at: order.created_at,
            status,
            items,
            total_price
        }
    }
}

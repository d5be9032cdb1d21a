//! Query-string filters for the list endpoints.
//!
//! Raw query structs are deserialized by actix, then checked into typed
//! filters; the typed filters are what the database layer understands.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

use crate::domain::order_status::OrderStatus;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError{
    #[error("{field}: Enter a number.")]
    InvalidNumber{ field: &'static str },
    #[error("{field}: Enter two numbers separated by a comma.")]
    InvalidRange{ field: &'static str },
    #[error("{field}: Enter a valid date (YYYY-MM-DD).")]
    InvalidDate{ field: &'static str },
    #[error("{field}: Enter true or false.")]
    InvalidBoolean{ field: &'static str },
    #[error("ordering: \"{0}\" is not an orderable field.")]
    InvalidOrdering(String),
    #[error("status: {0}")]
    InvalidStatus(String)
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductFilterQuery{
    /// Case-insensitive exact name.
    pub name: Option<String>,
    #[serde(rename = "name__icontains")]
    #[param(rename = "name__icontains")]
    pub name_icontains: Option<String>,
    pub price: Option<String>,
    #[serde(rename = "price__lt")]
    #[param(rename = "price__lt")]
    pub price_lt: Option<String>,
    #[serde(rename = "price__gt")]
    #[param(rename = "price__gt")]
    pub price_gt: Option<String>,
    /// Inclusive bounds, `min,max`.
    #[serde(rename = "price__range")]
    #[param(rename = "price__range")]
    pub price_range: Option<String>,
    /// Substring match over name and description.
    pub search: Option<String>,
    /// One of `name`, `price`, `stock`, optionally prefixed with `-`.
    pub ordering: Option<String>,
    /// Defaults to true: only products with stock left.
    pub in_stock: Option<String>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductOrderField{
    Id,
    Name,
    Price,
    Stock
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductOrdering{
    pub field: ProductOrderField,
    pub descending: bool
}

impl Default for ProductOrdering {
    fn default() -> Self {
        Self{ field: ProductOrderField::Id, descending: false }
    }
}

impl FromStr for ProductOrdering {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s)
        };

        let field = match name {
            "id" => ProductOrderField::Id,
            "name" => ProductOrderField::Name,
            "price" => ProductOrderField::Price,
            "stock" => ProductOrderField::Stock,
            _ => return Err(FilterError::InvalidOrdering(s.to_string()))
        };

        Ok(Self{ field, descending })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter{
    pub name_iexact: Option<String>,
    pub name_icontains: Option<String>,
    pub price_exact: Option<Decimal>,
    pub price_lt: Option<Decimal>,
    pub price_gt: Option<Decimal>,
    pub price_range: Option<(Decimal, Decimal)>,
    pub search: Option<String>,
    pub ordering: ProductOrdering,
    pub in_stock_only: bool
}

fn non_empty(value: &Option<String>) -> Option<String>{
    value.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_decimal(value: &Option<String>, field: &'static str) -> Result<Option<Decimal>, FilterError>{
    non_empty(value)
        .map(|v| Decimal::from_str(&v).map_err(|_| FilterError::InvalidNumber{ field }))
        .transpose()
}

fn parse_bool(value: &Option<String>, field: &'static str) -> Result<Option<bool>, FilterError>{
    non_empty(value)
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(FilterError::InvalidBoolean{ field })
        })
        .transpose()
}

impl ProductFilterQuery {
    pub fn parse(&self) -> Result<ProductFilter, FilterError>{
        let price_range = match non_empty(&self.price_range) {
            Some(range) => {
                let invalid = || FilterError::InvalidRange{ field: "price__range" };
                let (low, high) = range.split_once(',').ok_or_else(invalid)?;
                let low = Decimal::from_str(low.trim()).map_err(|_| invalid())?;
                let high = Decimal::from_str(high.trim()).map_err(|_| invalid())?;
                Some((low, high))
            },
            None => None
        };

        let ordering = match non_empty(&self.ordering) {
            Some(ordering) => ordering.parse()?,
            None => ProductOrdering::default()
        };

        Ok(ProductFilter{
            name_iexact: non_empty(&self.name),
            name_icontains: non_empty(&self.name_icontains),
            price_exact: parse_decimal(&self.price, "price")?,
            price_lt: parse_decimal(&self.price_lt, "price__lt")?,
            price_gt: parse_decimal(&self.price_gt, "price__gt")?,
            price_range,
            search: non_empty(&self.search),
            ordering,
            in_stock_only: parse_bool(&self.in_stock, "in_stock")?.unwrap_or(true)
        })
    }
}

/// Date filters compare against the calendar date (UTC) of `created_at`.
#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilterQuery{
    pub status: Option<String>,
    /// Orders created on this date.
    pub created_at: Option<String>,
    /// Orders created before this date.
    #[serde(rename = "created_at__lt")]
    #[param(rename = "created_at__lt")]
    pub created_at_lt: Option<String>,
    /// Orders created after this date.
    #[serde(rename = "created_at__gt")]
    #[param(rename = "created_at__gt")]
    pub created_at_gt: Option<String>
}

/// Half-open `created_at` bounds: `from <= created_at < until`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter{
    pub status: Option<OrderStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>
}

fn parse_date(value: &Option<String>, field: &'static str) -> Result<Option<NaiveDate>, FilterError>{
    non_empty(value)
        .map(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|_| FilterError::InvalidDate{ field }))
        .transpose()
}

fn start_of(date: NaiveDate) -> DateTime<Utc>{
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn start_of_next(date: NaiveDate, field: &'static str) -> Result<DateTime<Utc>, FilterError>{
    date.succ_opt()
        .map(start_of)
        .ok_or(FilterError::InvalidDate{ field })
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>>{
    a.into_iter().chain(b).max()
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>>{
    a.into_iter().chain(b).min()
}

impl OrderFilterQuery {
    pub fn parse(&self) -> Result<OrderFilter, FilterError>{
        let status = non_empty(&self.status)
            .map(|s| s.parse::<OrderStatus>().map_err(FilterError::InvalidStatus))
            .transpose()?;

        let mut filter = OrderFilter{ status, ..OrderFilter::default() };

        if let Some(date) = parse_date(&self.created_at, "created_at")? {
            filter.created_from = Some(start_of(date));
            filter.created_until = Some(start_of_next(date, "created_at")?);
        }

        if let Some(date) = parse_date(&self.created_at_lt, "created_at__lt")? {
            filter.created_until = earliest(filter.created_until, Some(start_of(date)));
        }

        if let Some(date) = parse_date(&self.created_at_gt, "created_at__gt")? {
            let from = start_of_next(date, "created_at__gt")?;
            filter.created_from = latest(filter.created_from, Some(from));
        }

        Ok(filter)
    }
}

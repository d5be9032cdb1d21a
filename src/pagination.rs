use actix_web::HttpRequest;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

use crate::configuration::PaginationSettings;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Page<T>{
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>
}

#[derive(Error, Debug, PartialEq)]
pub enum PaginationError{
    #[error("Invalid page.")]
    InvalidPage
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageNumberQuery{
    /// 1-based page number.
    pub page: Option<i64>,
    pub page_size: Option<i64>
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitOffsetQuery{
    pub limit: Option<i64>,
    pub offset: Option<i64>
}

fn clamp_size(requested: Option<i64>, settings: &PaginationSettings) -> i64{
    match requested {
        Some(size) if size > 0 => size.min(settings.max_page_size),
        _ => settings.page_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageNumberPagination{
    pub page: i64,
    pub page_size: i64
}

impl PageNumberPagination {
    pub fn resolve(query: &PageNumberQuery, settings: &PaginationSettings) -> Result<Self, PaginationError>{
        let page = query.page.unwrap_or(1);
        let page_size = clamp_size(query.page_size, settings);

        // A page whose offset does not fit in an i64 is past any possible end
        if page < 1 || (page - 1).checked_mul(page_size).is_none() {
            return Err(PaginationError::InvalidPage)
        }

        Ok(Self{ page, page_size })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Wraps one page of results. Asking for a page past the end is an error,
    /// except page 1 of an empty result set.
    pub fn paginate<T>(&self, req: &HttpRequest, count: i64, results: Vec<T>) -> Result<Page<T>, PaginationError>{
        let last_page = ((count + self.page_size - 1) / self.page_size).max(1);
        if self.page > last_page {
            return Err(PaginationError::InvalidPage)
        }

        let next = (self.page < last_page)
            .then(|| page_link(req, &[("page", Some((self.page + 1).to_string()))]))
            .flatten();

        let previous = match self.page {
            1 => None,
            // The first page link drops the page parameter entirely
            2 => page_link(req, &[("page", None)]),
            page => page_link(req, &[("page", Some((page - 1).to_string()))])
        };

        Ok(Page{ count, next, previous, results })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitOffsetPagination{
    pub limit: i64,
    pub offset: i64
}

impl LimitOffsetPagination {
    pub fn resolve(query: &LimitOffsetQuery, settings: &PaginationSettings) -> Self{
        Self{
            limit: clamp_size(query.limit, settings),
            offset: query.offset.unwrap_or(0).max(0)
        }
    }

    pub fn paginate<T>(&self, req: &HttpRequest, count: i64, results: Vec<T>) -> Page<T>{
        let limit = self.limit.to_string();

        let next_offset = self.offset.saturating_add(self.limit);
        let next = (next_offset < count)
            .then(|| page_link(req, &[
                ("limit", Some(limit.clone())),
                ("offset", Some(next_offset.to_string()))
            ]))
            .flatten();

        let previous = if self.offset <= 0 {
            None
        } else if self.offset - self.limit <= 0 {
            page_link(req, &[("limit", Some(limit.clone())), ("offset", None)])
        } else {
            page_link(req, &[
                ("limit", Some(limit.clone())),
                ("offset", Some((self.offset - self.limit).to_string()))
            ])
        };

        Page{ count, next, previous, results }
    }
}

/// Absolute URL of the current request with the given query parameters
/// replaced (`Some`) or removed (`None`); every other parameter is kept.
fn page_link(req: &HttpRequest, overrides: &[(&str, Option<String>)]) -> Option<String>{
    let connection = req.connection_info();
    let mut url = Url::parse(&format!(
        "{}://{}{}?{}",
        connection.scheme(),
        connection.host(),
        req.path(),
        req.query_string()
    )).ok()?;

    let mut pairs: Vec<(String, String)> = url.query_pairs()
        .into_owned()
        .filter(|(key, _)| !overrides.iter().any(|(name, _)| name == key))
        .collect();

    for (name, value) in overrides {
        if let Some(value) = value {
            pairs.push((name.to_string(), value.clone()));
        }
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Some(url.to_string())
}

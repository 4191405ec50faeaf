//! Query-string shapes. Numbers arrive as raw strings so a malformed value
//! becomes a 400 in the usual response envelope.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    services::catalog::{CatalogFilter, CatalogSort, DEFAULT_PAGE_SIZE},
};

pub const MAX_PAGE_SIZE: u64 = 100;

pub fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> AppResult<Option<T>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Invalid value for `{name}`: {value}"))),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn parse(page: Option<&str>, limit: Option<&str>, default_limit: u64) -> AppResult<Self> {
        let page = parse_param::<u64>("page", page)?.unwrap_or(1).max(1);
        let limit = parse_param::<u64>("limit", limit)?
            .unwrap_or(default_limit)
            .clamp(1, MAX_PAGE_SIZE);
        Ok(Self { page, limit })
    }

    /// Saturates, so an absurd page lands past the end instead of wrapping.
    pub fn offset(&self) -> usize {
        let offset = self.page.saturating_sub(1).saturating_mul(self.limit);
        usize::try_from(offset).unwrap_or(usize::MAX)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }

    /// The slice of `items` this page covers; empty past the end.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect()
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub featured: Option<String>,
    /// price_asc, price_desc, name_asc or newest
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ProductQuery {
    pub fn into_filter(self) -> AppResult<CatalogFilter> {
        let pagination = Pagination::parse(
            self.page.as_deref(),
            self.limit.as_deref(),
            DEFAULT_PAGE_SIZE,
        )?;
        Ok(CatalogFilter {
            search: self.search.filter(|s| !s.trim().is_empty()),
            category: self
                .category
                .filter(|c| !c.trim().is_empty() && !c.eq_ignore_ascii_case("all")),
            min_price: parse_param::<Decimal>("minPrice", self.min_price.as_deref())?,
            max_price: parse_param::<Decimal>("maxPrice", self.max_price.as_deref())?,
            featured: parse_param::<bool>("featured", self.featured.as_deref())?,
            sort: self
                .sort
                .as_deref()
                .map(CatalogSort::parse)
                .unwrap_or_default(),
            page: pagination.page,
            limit: pagination.limit,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub search: Option<String>,
    /// client, admin or all
    pub role: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LowStockQuery {
    pub threshold: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// RFC 3339 timestamp or YYYY-MM-DD
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination::parse(None, None, 12).unwrap();
        assert_eq!(p, Pagination { page: 1, limit: 12 });

        let p = Pagination::parse(Some("0"), Some("1000"), 12).unwrap();
        assert_eq!(p, Pagination { page: 1, limit: 100 });
        assert_eq!(p.total_pages(250), 3);
    }

    #[test]
    fn non_numeric_page_is_rejected() {
        assert!(matches!(
            Pagination::parse(Some("two"), None, 12),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn slice_past_the_end_is_empty() {
        let p = Pagination { page: 5, limit: 2 };
        assert!(p.slice(vec![1, 2, 3]).is_empty());
        let p = Pagination { page: 2, limit: 2 };
        assert_eq!(p.slice(vec![1, 2, 3]), vec![3]);
    }

    #[test]
    fn huge_page_saturates_instead_of_wrapping() {
        let p = Pagination::parse(Some("4611686018427387905"), Some("4"), 12).unwrap();
        assert_eq!(p.offset(), usize::MAX);
        assert!(p.slice(vec![1, 2, 3]).is_empty());
        let p = Pagination { page: u64::MAX, limit: 100 };
        assert!(p.slice(vec![1]).is_empty());
    }

    #[test]
    fn product_query_treats_all_as_no_category() {
        let filter = ProductQuery {
            category: Some("all".into()),
            min_price: Some("10".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert!(filter.category.is_none());
        assert_eq!(filter.min_price, Some(Decimal::from(10)));
        assert_eq!(filter.sort, CatalogSort::Newest);
    }

    #[test]
    fn product_query_rejects_bad_price() {
        let err = ProductQuery {
            max_price: Some("cheap".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

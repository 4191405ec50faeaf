//! Search, filter, sort and paginate over the live catalog.
//!
//! Everything here is pure: the caller loads live products (insertion order)
//! and this module shapes them into a page.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::{
    dto::products::{CatalogPage, CatalogPagination},
    models::Product,
    routes::params::Pagination,
};

pub const DEFAULT_PAGE_SIZE: u64 = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatalogSort {
    PriceAsc,
    PriceDesc,
    NameAsc,
    #[default]
    Newest,
}

impl CatalogSort {
    /// Unknown values fall back to newest first.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "price_asc" => CatalogSort::PriceAsc,
            "price_desc" => CatalogSort::PriceDesc,
            "name_asc" => CatalogSort::NameAsc,
            _ => CatalogSort::Newest,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: CatalogSort,
    pub page: u64,
    pub limit: u64,
}

impl Default for CatalogFilter {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            min_price: None,
            max_price: None,
            featured: None,
            sort: CatalogSort::Newest,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CatalogFilter {
    fn matches(&self, product: &Product, needle: Option<&str>) -> bool {
        if product.deleted_at.is_some() {
            return false;
        }
        if let Some(category) = &self.category
            && &product.category != category
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min)
            || self.max_price.is_some_and(|max| product.price > max)
        {
            return false;
        }
        if self.featured.is_some_and(|featured| product.featured != featured) {
            return false;
        }
        match needle {
            Some(needle) => [&product.name, &product.description, &product.category]
                .iter()
                .any(|field| field.to_lowercase().contains(needle)),
            None => true,
        }
    }
}

/// Distinct categories of live products, sorted.
pub fn categories(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .filter(|p| p.deleted_at.is_none())
        .map(|p| p.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn query_catalog(products: Vec<Product>, filter: &CatalogFilter) -> CatalogPage {
    let categories = categories(&products);
    let needle = filter.search.as_ref().map(|s| s.trim().to_lowercase());

    let mut matching: Vec<Product> = products
        .into_iter()
        .filter(|p| filter.matches(p, needle.as_deref()))
        .collect();

    // `sort_by` is stable, so ties keep insertion order.
    match filter.sort {
        CatalogSort::PriceAsc => matching.sort_by(|a, b| a.price.cmp(&b.price)),
        CatalogSort::PriceDesc => matching.sort_by(|a, b| b.price.cmp(&a.price)),
        CatalogSort::NameAsc => {
            matching.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
        CatalogSort::Newest => matching.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    let limit = filter.limit.max(1);
    let page = filter.page.max(1);
    let total = matching.len() as u64;
    let total_pages = total.div_ceil(limit);
    let products = Pagination { page, limit }.slice(matching);

    CatalogPage {
        products,
        pagination: CatalogPagination {
            current_page: page,
            total_pages,
            total_products: total,
            has_more: page < total_pages,
        },
        categories,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn product(name: &str, price: i64, category: &str, age_minutes: i64) -> Product {
        Product {
            id: name.to_lowercase(),
            name: name.into(),
            price: Decimal::from(price),
            description: String::new(),
            category: category.into(),
            stock: 1,
            image: String::new(),
            gallery: vec![],
            colors: vec![],
            sizes: vec![],
            featured: false,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn sample() -> Vec<Product> {
        vec![
            product("Robe", 120, "Robes", 30),
            product("Shirt", 20, "Tops", 20),
            product("scarf", 20, "Accessories", 10),
            product("Boots", 80, "Shoes", 0),
        ]
    }

    fn names(page: &CatalogPage) -> Vec<&str> {
        page.products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn default_sort_is_newest_first() {
        let page = query_catalog(sample(), &CatalogFilter::default());
        assert_eq!(names(&page), ["Boots", "scarf", "Shirt", "Robe"]);
        assert_eq!(page.categories, ["Accessories", "Robes", "Shoes", "Tops"]);
    }

    #[test]
    fn price_sort_is_stable_for_ties() {
        let filter = CatalogFilter {
            sort: CatalogSort::PriceAsc,
            ..Default::default()
        };
        let page = query_catalog(sample(), &filter);
        assert_eq!(names(&page), ["Shirt", "scarf", "Boots", "Robe"]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let filter = CatalogFilter {
            sort: CatalogSort::NameAsc,
            ..Default::default()
        };
        let page = query_catalog(sample(), &filter);
        assert_eq!(names(&page), ["Boots", "Robe", "scarf", "Shirt"]);
    }

    #[test]
    fn search_covers_name_description_and_category() {
        let filter = CatalogFilter {
            search: Some("ROB".into()),
            ..Default::default()
        };
        assert_eq!(names(&query_catalog(sample(), &filter)), ["Robe"]);

        let filter = CatalogFilter {
            search: Some("shoe".into()),
            ..Default::default()
        };
        assert_eq!(names(&query_catalog(sample(), &filter)), ["Boots"]);
    }

    #[test]
    fn price_range_and_category_combine() {
        let filter = CatalogFilter {
            min_price: Some(Decimal::from(20)),
            max_price: Some(Decimal::from(100)),
            category: Some("Tops".into()),
            ..Default::default()
        };
        assert_eq!(names(&query_catalog(sample(), &filter)), ["Shirt"]);
    }

    #[test]
    fn page_beyond_end_keeps_total() {
        for page in [3, 4_611_686_018_427_387_905, u64::MAX] {
            let filter = CatalogFilter {
                page,
                limit: 4,
                ..Default::default()
            };
            let result = query_catalog(sample(), &filter);
            assert!(result.products.is_empty(), "page {page}");
            assert_eq!(result.pagination.total_products, 4);
            assert_eq!(result.pagination.total_pages, 1);
            assert!(!result.pagination.has_more);
        }
    }

    #[test]
    fn first_page_reports_more() {
        let filter = CatalogFilter {
            limit: 3,
            ..Default::default()
        };
        let page = query_catalog(sample(), &filter);
        assert_eq!(page.products.len(), 3);
        assert!(page.pagination.has_more);
    }

    #[test]
    fn deleted_products_never_appear() {
        let mut products = sample();
        products[0].deleted_at = Some(Utc::now());
        let page = query_catalog(products, &CatalogFilter::default());
        assert_eq!(page.pagination.total_products, 3);
        assert!(!page.categories.contains(&"Robes".to_string()));
    }
}

//! `page`/`limit` handling for list endpoints.
//!
//! Query values arrive as text and are checked here so a bad value still
//! gets an error envelope instead of a bare extractor rejection.

use serde::Serialize;

use crate::error::AppError;
use crate::validation::{self, ValidationErrors};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Parses the raw query values. Missing values take the defaults and
    /// `limit` is capped at [`MAX_LIMIT`].
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Result<Self, AppError> {
        let mut errors = ValidationErrors::default();
        let page = validation::optional_positive(&mut errors, "page", page);
        let limit = validation::optional_positive(&mut errors, "limit", limit);
        errors.into_result()?;
        Ok(Self {
            page: page.map_or(1, |p| p as u64),
            limit: limit.map_or(DEFAULT_LIMIT, |l| (l as u64).min(MAX_LIMIT)),
        })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta {
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total.div_ceil(self.limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// One page of a listing. Serializes as `{data, pagination}`, which the
/// gateway passes through untouched.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: Page, total: u64) -> Self {
        Self {
            data,
            pagination: page.meta(total),
        }
    }
}

//! Filter and sort types for the student store.
//!
//! Raw query-string values are parsed once into a [`ListingQuery`]; the
//! store only ever sees the typed [`FilterSpec`] and [`SortSpec`].

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::students::bands::PerformanceBand;
use crate::students::error::StudentError;
use crate::students::repo_types::Student;
use crate::students::validation::parse_gpa;

pub const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Case-insensitive substring of first name, last name or email.
    pub search: Option<String>,
    pub gpa_min: Option<Decimal>,
    pub gpa_max: Option<Decimal>,
    pub band: Option<PerformanceBand>,
    /// Restrict to these ids (bulk export).
    pub ids: Option<Vec<i64>>,
}

impl FilterSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids(ids: Vec<i64>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    /// Lowercased search term, as both stores compare it.
    pub fn search_needle(&self) -> Option<String> {
        self.search.as_deref().map(str::to_lowercase)
    }

    pub fn matches(&self, s: &Student) -> bool {
        if let Some(needle) = self.search_needle() {
            let hit = s.first_name.to_lowercase().contains(&needle)
                || s.last_name.to_lowercase().contains(&needle)
                || s.email.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if self.gpa_min.is_some_and(|min| s.gpa < min) {
            return false;
        }
        if self.gpa_max.is_some_and(|max| s.gpa > max) {
            return false;
        }
        if self.band.is_some_and(|band| !band.contains(s.gpa)) {
            return false;
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&s.id) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    FirstName,
    LastName,
    Email,
    Gpa,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "first_name" => Some(Self::FirstName),
            "last_name" => Some(Self::LastName),
            "email" => Some(Self::Email),
            "gpa" => Some(Self::Gpa),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Gpa => "gpa",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::desc(SortField::CreatedAt)
    }
}

impl SortSpec {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// Unknown keys fall back to newest-first instead of failing.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::default();
        };
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        SortField::parse(name)
            .map(|field| Self { field, descending })
            .unwrap_or_default()
    }

    /// The key as it appears in a query string, e.g. `-gpa`.
    pub fn as_param(&self) -> String {
        if self.descending {
            format!("-{}", self.field.column())
        } else {
            self.field.column().to_string()
        }
    }

    /// Text sorts case-insensitively, then by raw text. Ties are broken by
    /// id in the same direction. Must agree with `order_by_sql`.
    pub fn compare(&self, a: &Student, b: &Student) -> Ordering {
        let primary = match self.field {
            SortField::Id => Ordering::Equal,
            SortField::FirstName => text_order(&a.first_name, &b.first_name),
            SortField::LastName => text_order(&a.last_name, &b.last_name),
            SortField::Email => text_order(&a.email, &b.email),
            SortField::Gpa => a.gpa.cmp(&b.gpa),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        let ord = primary.then_with(|| a.id.cmp(&b.id));
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }

    pub fn order_by_sql(&self) -> String {
        let dir = if self.descending { "DESC" } else { "ASC" };
        match self.field {
            SortField::Id => format!("id {dir}"),
            SortField::FirstName | SortField::LastName | SortField::Email => {
                let col = self.field.column();
                format!(
                    "lower({col}) COLLATE \"C\" {dir}, {col} COLLATE \"C\" {dir}, id {dir}"
                )
            }
            field => format!("{} {dir}, id {dir}", field.column()),
        }
    }
}

fn text_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Raw listing parameters as they arrive in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingParams {
    pub q: Option<String>,
    pub min_gpa: Option<String>,
    pub max_gpa: Option<String>,
    pub performance: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Parsed, per-request listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub page: u64,
    pub page_size: u64,
}

/// Echo of the applied parameters, returned with a listing.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedQuery {
    pub q: Option<String>,
    pub min_gpa: Option<Decimal>,
    pub max_gpa: Option<Decimal>,
    pub performance: Option<PerformanceBand>,
    pub sort: String,
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bound(name: &'static str, raw: Option<&str>) -> Result<Option<Decimal>, StudentError> {
    non_blank(raw)
        .map(|v| {
            parse_gpa(v).ok_or_else(|| {
                StudentError::invalid(name, "must be a number with at most 2 decimal places")
            })
        })
        .transpose()
}

fn parse_positive(
    name: &'static str,
    raw: Option<&str>,
    default: u64,
) -> Result<u64, StudentError> {
    match non_blank(raw) {
        None => Ok(default),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(StudentError::invalid(name, "must be a positive integer")),
        },
    }
}

impl ListingQuery {
    pub fn parse(params: &ListingParams, default_page_size: u64) -> Result<Self, StudentError> {
        let search = non_blank(params.q.as_deref()).map(str::to_string);
        let gpa_min = parse_bound("min_gpa", params.min_gpa.as_deref())?;
        let gpa_max = parse_bound("max_gpa", params.max_gpa.as_deref())?;
        let band = non_blank(params.performance.as_deref())
            .map(|v| {
                PerformanceBand::parse(v).ok_or_else(|| {
                    StudentError::invalid(
                        "performance",
                        "expected excellent, good or needs_improvement",
                    )
                })
            })
            .transpose()?;
        let sort = SortSpec::parse(non_blank(params.sort.as_deref()));
        let page = parse_positive("page", params.page.as_deref(), 1)?;
        let page_size =
            parse_positive("page_size", params.page_size.as_deref(), default_page_size)?;

        Ok(Self {
            filter: FilterSpec {
                search,
                gpa_min,
                gpa_max,
                band,
                ids: None,
            },
            sort,
            page,
            page_size,
        })
    }

    pub fn applied(&self) -> AppliedQuery {
        AppliedQuery {
            q: self.filter.search.clone(),
            min_gpa: self.filter.gpa_min,
            max_gpa: self.filter.gpa_max,
            performance: self.filter.band,
            sort: self.sort.as_param(),
        }
    }
}

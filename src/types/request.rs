use serde::Deserialize;

use crate::types::post::PostFilter;

pub(crate) const DEFAULT_PAGE_SIZE: i64 = 20;
pub(crate) const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub(crate) struct RegisterData {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Deserialize)]
pub(crate) struct LoginData {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateUserData {
    pub(crate) username: Option<String>,
    pub(crate) email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostInput {
    pub(crate) title: String,
    pub(crate) content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostUpdateInput {
    pub(crate) title: Option<String>,
    pub(crate) content: Option<String>,
}

/// Raw query string for listing posts. Every field is a string so that junk
/// values fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) page: Option<String>,
    pub(crate) page_size: Option<String>,
    pub(crate) sort: Option<String>,
    pub(crate) sort_by: Option<String>,
    pub(crate) user_id: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) content: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Columns a listing may be ordered by. Anything else falls back to `created_at`,
/// which keeps user input out of the ORDER BY clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SortField {
    Id,
    Title,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "id" => Some(SortField::Id),
            "title" => Some(SortField::Title),
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            _ => None,
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Pagination {
    pub(crate) page: i64,
    pub(crate) page_size: i64,
    pub(crate) sort: SortOrder,
    pub(crate) sort_by: SortField,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::Desc,
            sort_by: SortField::CreatedAt,
        }
    }
}

impl Pagination {
    pub(crate) fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

fn positive(value: &Option<String>) -> Option<i64> {
    value
        .as_deref()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|value| !value.is_empty())
}

impl ListQuery {
    pub(crate) fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();

        Pagination {
            page: positive(&self.page).unwrap_or(defaults.page),
            page_size: positive(&self.page_size)
                .map(|size| size.min(MAX_PAGE_SIZE))
                .unwrap_or(defaults.page_size),
            sort: match self.sort.as_deref() {
                Some("asc") => SortOrder::Asc,
                Some("desc") => SortOrder::Desc,
                _ => defaults.sort,
            },
            sort_by: self
                .sort_by
                .as_deref()
                .and_then(SortField::parse)
                .unwrap_or(defaults.sort_by),
        }
    }

    pub(crate) fn filter(&self) -> PostFilter {
        PostFilter {
            user_id: positive(&self.user_id),
            title: non_empty(&self.title),
            content: non_empty(&self.content),
        }
    }
}

//! Normalized filter sets for list queries.
//!
//! Every list view describes what it wants with a typed filter struct
//! (`InputFilters`, `InquiryFilters`, ...). Those are lowered into a
//! [`FilterSet`], a sorted map of field name to [`FilterValue`], which is what
//! participates in cache keys and query strings. Lowering drops empty fields,
//! trims text, and sorts/deduplicates lists, so two filter structs that mean
//! the same thing always produce equal filter sets.

use crate::enums::{InputStatus, InquiryStatus, Sentiment, Severity, TopicStatus};
use crate::identity::{DepartmentId, InquiryId, ThemeId, TopicId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single normalized filter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Text(String),
    /// Always sorted and deduplicated.
    List(Vec<String>),
}

impl FilterValue {
    /// Render for use as an HTTP query parameter value.
    pub fn to_query_value(&self) -> String {
        match self {
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Text(s) => s.clone(),
            FilterValue::List(items) => items.join(","),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query_value())
    }
}

/// Sorted, normalized field → value map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterValue>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value after normalizing it. Empty text and empty lists are
    /// treated as "no filter" and remove the field instead.
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        let field = field.into();
        match normalize(value) {
            Some(value) => {
                self.0.insert(field, value);
            }
            None => {
                self.0.remove(&field);
            }
        }
    }

    /// Builder form of [`FilterSet::insert`].
    pub fn with(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert only when `value` is `Some`.
    pub fn with_opt<T: Into<FilterValue>>(mut self, field: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.insert(field, value.into());
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Query-string pairs in field order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_query_value()))
            .collect()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, value) in &self.0 {
            if !first {
                write!(f, "&")?;
            }
            write!(f, "{}={}", field, value)?;
            first = false;
        }
        Ok(())
    }
}

fn normalize(value: FilterValue) -> Option<FilterValue> {
    match value {
        FilterValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(FilterValue::Text(trimmed.to_string()))
            }
        }
        FilterValue::List(items) => {
            let mut items: Vec<String> = items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            items.sort();
            items.dedup();
            if items.is_empty() {
                None
            } else {
                Some(FilterValue::List(items))
            }
        }
        other => Some(other),
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

macro_rules! filter_value_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Text(value.to_string())
                }
            }
        )*
    };
}

filter_value_from_display!(
    InputStatus,
    InquiryStatus,
    TopicStatus,
    Sentiment,
    Severity,
    InquiryId,
    TopicId,
    DepartmentId,
    SortOrder,
);

/// Lower a typed filter description into the normalized form.
pub trait IntoFilterSet {
    fn to_filter_set(&self) -> FilterSet;
}

impl IntoFilterSet for FilterSet {
    fn to_filter_set(&self) -> FilterSet {
        self.clone()
    }
}

/// List ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Newest => write!(f, "newest"),
            SortOrder::Oldest => write!(f, "oldest"),
        }
    }
}

/// Page selection shared by every list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    fn apply(&self, set: FilterSet) -> FilterSet {
        set.with_opt("page", self.page)
            .with_opt("pageSize", self.page_size)
    }
}

/// Filters for `inputs-list` and `my-inputs`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputFilters {
    pub status: Option<InputStatus>,
    pub sentiment: Option<Sentiment>,
    pub severity: Option<Severity>,
    pub inquiry_id: Option<InquiryId>,
    pub topic_id: Option<TopicId>,
    pub theme_ids: Vec<ThemeId>,
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
    pub page: PageRequest,
}

impl IntoFilterSet for InputFilters {
    fn to_filter_set(&self) -> FilterSet {
        let set = FilterSet::new()
            .with_opt("status", self.status)
            .with_opt("sentiment", self.sentiment)
            .with_opt("severity", self.severity)
            .with_opt("inquiryId", self.inquiry_id)
            .with_opt("topicId", self.topic_id)
            .with(
                "themeIds",
                FilterValue::List(self.theme_ids.iter().map(ToString::to_string).collect()),
            )
            .with_opt("search", self.search.clone())
            .with_opt("sort", self.sort);
        self.page.apply(set)
    }
}

/// Filters for `inquiries-list`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InquiryFilters {
    pub status: Option<InquiryStatus>,
    pub department_id: Option<DepartmentId>,
    pub search: Option<String>,
    pub page: PageRequest,
}

impl IntoFilterSet for InquiryFilters {
    fn to_filter_set(&self) -> FilterSet {
        let set = FilterSet::new()
            .with_opt("status", self.status)
            .with_opt("departmentId", self.department_id)
            .with_opt("search", self.search.clone());
        self.page.apply(set)
    }
}

/// Filters for `topics-list`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicFilters {
    pub status: Option<TopicStatus>,
    pub include_archived: Option<bool>,
    pub search: Option<String>,
    pub page: PageRequest,
}

impl IntoFilterSet for TopicFilters {
    fn to_filter_set(&self) -> FilterSet {
        let set = FilterSet::new()
            .with_opt("status", self.status)
            .with_opt("includeArchived", self.include_archived)
            .with_opt("search", self.search.clone());
        self.page.apply(set)
    }
}

/// Filters for the directory lists (departments, programs, semesters,
/// themes, users).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryFilters {
    pub department_id: Option<DepartmentId>,
    pub search: Option<String>,
    pub page: PageRequest,
}

impl IntoFilterSet for DirectoryFilters {
    fn to_filter_set(&self) -> FilterSet {
        let set = FilterSet::new()
            .with_opt("departmentId", self.department_id)
            .with_opt("search", self.search.clone());
        self.page.apply(set)
    }
}

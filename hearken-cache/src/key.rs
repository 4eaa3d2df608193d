//! Cache key registry.
//!
//! Every cacheable query is named by a [`CacheKey`]: a resource, an optional
//! identifier, and a normalized [`FilterSet`]. Keys can only be built through
//! the constructors here, so the filter half of a key is always normalized
//! and two keys compare equal exactly when they mean the same query.

use hearken_core::{EntityIdType, FilterSet, IntoFilterSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Entity family a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFamily {
    Input,
    Inquiry,
    Topic,
    Department,
    Program,
    Semester,
    Theme,
    User,
}

/// Every cacheable query the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    InputsList,
    MyInputs,
    InputDetail,
    InputReplies,
    InputStats,
    InquiriesList,
    InquiryDetail,
    TopicsList,
    TopicDetail,
    DepartmentsList,
    DepartmentDetail,
    ProgramsList,
    ProgramDetail,
    SemestersList,
    SemesterDetail,
    ThemesList,
    ThemeDetail,
    UsersList,
    UserDetail,
}

impl Resource {
    pub const ALL: [Resource; 19] = [
        Resource::InputsList,
        Resource::MyInputs,
        Resource::InputDetail,
        Resource::InputReplies,
        Resource::InputStats,
        Resource::InquiriesList,
        Resource::InquiryDetail,
        Resource::TopicsList,
        Resource::TopicDetail,
        Resource::DepartmentsList,
        Resource::DepartmentDetail,
        Resource::ProgramsList,
        Resource::ProgramDetail,
        Resource::SemestersList,
        Resource::SemesterDetail,
        Resource::ThemesList,
        Resource::ThemeDetail,
        Resource::UsersList,
        Resource::UserDetail,
    ];

    /// Stable kebab-case name used in logs, config, and key rendering.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::InputsList => "inputs-list",
            Resource::MyInputs => "my-inputs",
            Resource::InputDetail => "input-detail",
            Resource::InputReplies => "input-replies",
            Resource::InputStats => "input-stats",
            Resource::InquiriesList => "inquiries-list",
            Resource::InquiryDetail => "inquiry-detail",
            Resource::TopicsList => "topics-list",
            Resource::TopicDetail => "topic-detail",
            Resource::DepartmentsList => "departments-list",
            Resource::DepartmentDetail => "department-detail",
            Resource::ProgramsList => "programs-list",
            Resource::ProgramDetail => "program-detail",
            Resource::SemestersList => "semesters-list",
            Resource::SemesterDetail => "semester-detail",
            Resource::ThemesList => "themes-list",
            Resource::ThemeDetail => "theme-detail",
            Resource::UsersList => "users-list",
            Resource::UserDetail => "user-detail",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, UnknownResource> {
        Resource::ALL
            .iter()
            .copied()
            .find(|resource| resource.name() == name)
            .ok_or_else(|| UnknownResource(name.to_string()))
    }

    pub fn family(&self) -> ResourceFamily {
        match self {
            Resource::InputsList
            | Resource::MyInputs
            | Resource::InputDetail
            | Resource::InputReplies
            | Resource::InputStats => ResourceFamily::Input,
            Resource::InquiriesList | Resource::InquiryDetail => ResourceFamily::Inquiry,
            Resource::TopicsList | Resource::TopicDetail => ResourceFamily::Topic,
            Resource::DepartmentsList | Resource::DepartmentDetail => ResourceFamily::Department,
            Resource::ProgramsList | Resource::ProgramDetail => ResourceFamily::Program,
            Resource::SemestersList | Resource::SemesterDetail => ResourceFamily::Semester,
            Resource::ThemesList | Resource::ThemeDetail => ResourceFamily::Theme,
            Resource::UsersList | Resource::UserDetail => ResourceFamily::User,
        }
    }

    /// Whether the resource is addressed by an identifier.
    pub fn is_instance(&self) -> bool {
        matches!(
            self,
            Resource::InputDetail
                | Resource::InputReplies
                | Resource::InquiryDetail
                | Resource::TopicDetail
                | Resource::DepartmentDetail
                | Resource::ProgramDetail
                | Resource::SemesterDetail
                | Resource::ThemeDetail
                | Resource::UserDetail
        )
    }

    /// Stale time used when the configuration has no override.
    ///
    /// Directory data changes rarely; input data changes as analysis runs.
    pub fn default_stale_time(&self) -> Duration {
        match self.family() {
            ResourceFamily::Input => match self {
                Resource::InputStats => Duration::from_secs(60),
                _ => Duration::from_secs(30),
            },
            ResourceFamily::Inquiry | ResourceFamily::Topic => Duration::from_secs(60),
            ResourceFamily::Department
            | ResourceFamily::Program
            | ResourceFamily::Semester
            | ResourceFamily::Theme
            | ResourceFamily::User => Duration::from_secs(300),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown resource: {0}")]
pub struct UnknownResource(pub String);

/// Identity of one cacheable query result.
///
/// The private inner struct means a key cannot be assembled field by field;
/// callers go through [`key_for`] or the typed constructors, all of which
/// take an already-normalized [`FilterSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct KeyInner {
    resource: Resource,
    id: Option<Uuid>,
    filters: FilterSet,
}

/// Build the key for `(resource, id?, filters?)`.
pub fn key_for(resource: Resource, id: Option<Uuid>, filters: Option<&FilterSet>) -> CacheKey {
    CacheKey {
        inner: KeyInner {
            resource,
            id,
            filters: filters.cloned().unwrap_or_default(),
        },
    }
}

impl CacheKey {
    /// A list query narrowed by typed filters.
    pub fn list(resource: Resource, filters: &impl IntoFilterSet) -> Self {
        key_for(resource, None, Some(&filters.to_filter_set()))
    }

    /// A single resource instance.
    pub fn instance(resource: Resource, id: impl EntityIdType) -> Self {
        key_for(resource, Some(id.as_uuid()), None)
    }

    /// An instance-scoped list (e.g. the replies of one input).
    pub fn instance_list(
        resource: Resource,
        id: impl EntityIdType,
        filters: &impl IntoFilterSet,
    ) -> Self {
        key_for(resource, Some(id.as_uuid()), Some(&filters.to_filter_set()))
    }

    /// A resource with neither identifier nor filters.
    pub fn bare(resource: Resource) -> Self {
        key_for(resource, None, None)
    }

    pub fn resource(&self) -> Resource {
        self.inner.resource
    }

    pub fn id(&self) -> Option<Uuid> {
        self.inner.id
    }

    pub fn filters(&self) -> &FilterSet {
        &self.inner.filters
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.resource)?;
        if let Some(id) = self.inner.id {
            write!(f, "/{}", id)?;
        }
        if !self.inner.filters.is_empty() {
            write!(f, "?{}", self.inner.filters)?;
        }
        Ok(())
    }
}

/// Selector over cache keys used by invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Exactly one key.
    Exact(CacheKey),
    /// Every key of `resource` with this identifier, whatever its filters.
    Instance { resource: Resource, id: Uuid },
    /// Every key of `resource`, whatever its identifier and filters.
    Resource(Resource),
}

impl KeyPattern {
    pub fn instance(resource: Resource, id: impl EntityIdType) -> Self {
        KeyPattern::Instance {
            resource,
            id: id.as_uuid(),
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Instance { resource, id } => {
                key.resource() == *resource && key.id() == Some(*id)
            }
            KeyPattern::Resource(resource) => key.resource() == *resource,
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            KeyPattern::Exact(key) => key.resource(),
            KeyPattern::Instance { resource, .. } | KeyPattern::Resource(resource) => *resource,
        }
    }

    /// Whether this pattern selects at least everything `other` selects.
    pub fn covers(&self, other: &KeyPattern) -> bool {
        match (self, other) {
            (KeyPattern::Resource(a), _) => *a == other.resource(),
            (KeyPattern::Instance { resource, id }, KeyPattern::Instance { resource: r, id: i }) => {
                resource == r && id == i
            }
            (KeyPattern::Instance { .. }, KeyPattern::Exact(key)) => self.matches(key),
            (KeyPattern::Exact(a), KeyPattern::Exact(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(key) => write!(f, "{}", key),
            KeyPattern::Instance { resource, id } => write!(f, "{}({})", resource, id),
            KeyPattern::Resource(resource) => write!(f, "{}(*)", resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearken_core::{InputFilters, InputId, InputStatus};

    #[test]
    fn test_resource_names_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_name(resource.name()), Ok(resource));
        }
        assert!(Resource::from_name("widgets").is_err());
    }

    #[test]
    fn test_resource_serde_uses_names() {
        let json = serde_json::to_string(&Resource::MyInputs).unwrap();
        assert_eq!(json, "\"my-inputs\"");
    }

    #[test]
    fn test_keys_compare_by_value() {
        let a = CacheKey::list(
            Resource::InputsList,
            &InputFilters {
                status: Some(InputStatus::Pending),
                search: Some(" late bus ".to_string()),
                ..Default::default()
            },
        );
        let b = CacheKey::list(
            Resource::InputsList,
            &InputFilters {
                search: Some("late bus".to_string()),
                status: Some(InputStatus::Pending),
                ..Default::default()
            },
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_resource_and_id_distinguish_keys() {
        let id = InputId::now_v7();
        assert_ne!(
            CacheKey::instance(Resource::InputDetail, id),
            CacheKey::instance(Resource::InputReplies, id)
        );
        assert_ne!(
            CacheKey::instance(Resource::InputDetail, id),
            CacheKey::instance(Resource::InputDetail, InputId::now_v7())
        );
    }

    #[test]
    fn test_patterns() {
        let id = InputId::now_v7();
        let detail = CacheKey::instance(Resource::InputDetail, id);
        let list = CacheKey::list(Resource::InputsList, &InputFilters::default());

        assert!(KeyPattern::Resource(Resource::InputsList).matches(&list));
        assert!(!KeyPattern::Resource(Resource::InputsList).matches(&detail));
        assert!(KeyPattern::instance(Resource::InputDetail, id).matches(&detail));
        assert!(!KeyPattern::instance(Resource::InputDetail, InputId::now_v7()).matches(&detail));
        assert!(KeyPattern::Exact(list.clone()).matches(&list));
    }

    #[test]
    fn test_pattern_coverage() {
        let id = InputId::now_v7();
        let prefix = KeyPattern::Resource(Resource::InputDetail);
        let instance = KeyPattern::instance(Resource::InputDetail, id);
        assert!(prefix.covers(&instance));
        assert!(!instance.covers(&prefix));
        assert!(instance.covers(&instance));
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::list(
            Resource::InputsList,
            &InputFilters {
                status: Some(InputStatus::Processed),
                ..Default::default()
            },
        );
        assert_eq!(key.to_string(), "inputs-list?status=PROCESSED");
        assert_eq!(
            KeyPattern::Resource(Resource::MyInputs).to_string(),
            "my-inputs(*)"
        );
    }
}

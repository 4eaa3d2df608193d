//! Invalidation coordinator.
//!
//! Every write the client can perform is a [`MutationKind`], and
//! [`MutationKind::effects`] is the single table mapping it to the key
//! patterns it makes stale. The coordinator applies that table to the
//! query cache, only after the mutation's network call has succeeded, and
//! records each application in an [`InvalidationLog`].

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hearken_core::{EntityIdType, InputId, InquiryId, SyncResult, TopicId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::{KeyPattern, Resource};
use crate::query_cache::QueryCache;
use crate::watermark::Watermark;

/// Administrative directory entities sharing the same list/detail shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryKind {
    Department,
    Program,
    Semester,
    Theme,
    User,
}

impl DirectoryKind {
    pub const ALL: [DirectoryKind; 5] = [
        DirectoryKind::Department,
        DirectoryKind::Program,
        DirectoryKind::Semester,
        DirectoryKind::Theme,
        DirectoryKind::User,
    ];

    pub fn list_resource(&self) -> Resource {
        match self {
            DirectoryKind::Department => Resource::DepartmentsList,
            DirectoryKind::Program => Resource::ProgramsList,
            DirectoryKind::Semester => Resource::SemestersList,
            DirectoryKind::Theme => Resource::ThemesList,
            DirectoryKind::User => Resource::UsersList,
        }
    }

    pub fn detail_resource(&self) -> Resource {
        match self {
            DirectoryKind::Department => Resource::DepartmentDetail,
            DirectoryKind::Program => Resource::ProgramDetail,
            DirectoryKind::Semester => Resource::SemesterDetail,
            DirectoryKind::Theme => Resource::ThemeDetail,
            DirectoryKind::User => Resource::UserDetail,
        }
    }

    /// URL path segment of the collection.
    pub fn path_segment(&self) -> &'static str {
        match self {
            DirectoryKind::Department => "departments",
            DirectoryKind::Program => "programs",
            DirectoryKind::Semester => "semesters",
            DirectoryKind::Theme => "themes",
            DirectoryKind::User => "users",
        }
    }
}

impl fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectoryKind::Department => "department",
            DirectoryKind::Program => "program",
            DirectoryKind::Semester => "semester",
            DirectoryKind::Theme => "theme",
            DirectoryKind::User => "user",
        };
        write!(f, "{}", name)
    }
}

/// Every successful write the client can observe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// The identifier is known only once the server answers.
    InputSubmitted { id: Option<InputId> },
    InputUpdated { id: InputId },
    InputDeleted { id: InputId },
    /// Admin-driven processing transition.
    InputStatusChanged { id: InputId },
    InputLinkedToTopic { input_id: InputId, topic_id: TopicId },
    RevealRequested { id: InputId },
    RevealResponded { id: InputId },
    ReplyCreated { input_id: InputId },
    CsvImported,

    InquiryCreated { id: Option<InquiryId> },
    InquiryUpdated { id: InquiryId },
    InquirySent { id: InquiryId },
    InquiryClosed { id: InquiryId },
    InquiryDeleted { id: InquiryId },

    TopicUpdated { id: TopicId },
    TopicStatusChanged { id: TopicId },
    TopicArchived { id: TopicId },
    TopicSummaryRegenerated { id: TopicId },

    DirectoryCreated { kind: DirectoryKind, id: Option<Uuid> },
    DirectoryUpdated { kind: DirectoryKind, id: Uuid },
    DirectoryDeleted { kind: DirectoryKind, id: Uuid },
}

fn all(resource: Resource) -> KeyPattern {
    KeyPattern::Resource(resource)
}

fn one(resource: Resource, id: impl EntityIdType) -> KeyPattern {
    KeyPattern::instance(resource, id)
}

impl MutationKind {
    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::InputSubmitted { .. } => "input_submitted",
            MutationKind::InputUpdated { .. } => "input_updated",
            MutationKind::InputDeleted { .. } => "input_deleted",
            MutationKind::InputStatusChanged { .. } => "input_status_changed",
            MutationKind::InputLinkedToTopic { .. } => "input_linked_to_topic",
            MutationKind::RevealRequested { .. } => "reveal_requested",
            MutationKind::RevealResponded { .. } => "reveal_responded",
            MutationKind::ReplyCreated { .. } => "reply_created",
            MutationKind::CsvImported => "csv_imported",
            MutationKind::InquiryCreated { .. } => "inquiry_created",
            MutationKind::InquiryUpdated { .. } => "inquiry_updated",
            MutationKind::InquirySent { .. } => "inquiry_sent",
            MutationKind::InquiryClosed { .. } => "inquiry_closed",
            MutationKind::InquiryDeleted { .. } => "inquiry_deleted",
            MutationKind::TopicUpdated { .. } => "topic_updated",
            MutationKind::TopicStatusChanged { .. } => "topic_status_changed",
            MutationKind::TopicArchived { .. } => "topic_archived",
            MutationKind::TopicSummaryRegenerated { .. } => "topic_summary_regenerated",
            MutationKind::DirectoryCreated { .. } => "directory_created",
            MutationKind::DirectoryUpdated { .. } => "directory_updated",
            MutationKind::DirectoryDeleted { .. } => "directory_deleted",
        }
    }

    /// Key patterns this mutation makes stale.
    ///
    /// Any mutation that changes input content, status, or count also
    /// invalidates `input-stats`, since the aggregate is derived from them.
    pub fn effects(&self) -> Vec<KeyPattern> {
        use Resource::*;

        match self {
            MutationKind::InputSubmitted { id } => {
                let mut effects = vec![all(InputsList), all(MyInputs), all(InputStats)];
                if let Some(id) = id {
                    effects.push(one(InputDetail, *id));
                }
                effects
            }
            MutationKind::InputUpdated { id } | MutationKind::InputStatusChanged { id } => vec![
                all(InputsList),
                all(MyInputs),
                one(InputDetail, *id),
                all(InputStats),
            ],
            MutationKind::InputDeleted { id } => vec![
                all(InputsList),
                all(MyInputs),
                one(InputDetail, *id),
                one(InputReplies, *id),
                all(InputStats),
                all(TopicDetail),
            ],
            MutationKind::InputLinkedToTopic { input_id, topic_id } => vec![
                all(InputsList),
                one(InputDetail, *input_id),
                one(TopicDetail, *topic_id),
                all(TopicsList),
            ],
            MutationKind::RevealRequested { id } | MutationKind::RevealResponded { id } => {
                vec![all(InputsList), all(MyInputs), one(InputDetail, *id)]
            }
            MutationKind::ReplyCreated { input_id } => {
                vec![one(InputReplies, *input_id), one(InputDetail, *input_id)]
            }
            MutationKind::CsvImported => {
                vec![all(InputsList), all(MyInputs), all(InputStats)]
            }

            MutationKind::InquiryCreated { id } => {
                let mut effects = vec![all(InquiriesList)];
                if let Some(id) = id {
                    effects.push(one(InquiryDetail, *id));
                }
                effects
            }
            MutationKind::InquiryUpdated { id }
            | MutationKind::InquirySent { id }
            | MutationKind::InquiryClosed { id }
            | MutationKind::InquiryDeleted { id } => {
                vec![all(InquiriesList), one(InquiryDetail, *id)]
            }

            MutationKind::TopicUpdated { id }
            | MutationKind::TopicStatusChanged { id }
            | MutationKind::TopicArchived { id }
            | MutationKind::TopicSummaryRegenerated { id } => {
                vec![all(TopicsList), one(TopicDetail, *id)]
            }

            MutationKind::DirectoryCreated { kind, id } => {
                let mut effects = vec![all(kind.list_resource())];
                if let Some(id) = id {
                    effects.push(KeyPattern::Instance {
                        resource: kind.detail_resource(),
                        id: *id,
                    });
                }
                effects
            }
            MutationKind::DirectoryUpdated { kind, id }
            | MutationKind::DirectoryDeleted { kind, id } => vec![
                all(kind.list_resource()),
                KeyPattern::Instance {
                    resource: kind.detail_resource(),
                    id: *id,
                },
            ],
        }
    }

    /// Resources touched by [`MutationKind::effects`], deduplicated.
    pub fn resources(&self) -> Vec<Resource> {
        self.effects()
            .iter()
            .map(KeyPattern::resource)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::DirectoryCreated { kind, .. }
            | MutationKind::DirectoryUpdated { kind, .. }
            | MutationKind::DirectoryDeleted { kind, .. } => {
                write!(f, "{}:{}", self.name(), kind)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

// ============================================================================
// LOG
// ============================================================================

/// One applied invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRecord {
    pub watermark: Watermark,
    pub mutation: MutationKind,
    pub resources: Vec<Resource>,
    /// Number of cache entries marked stale.
    pub invalidated: usize,
}

/// Bounded history of applied invalidations.
#[derive(Debug)]
pub struct InvalidationLog {
    sequence: u64,
    records: VecDeque<InvalidationRecord>,
    capacity: usize,
}

impl Default for InvalidationLog {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl InvalidationLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sequence: 0,
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn current_watermark(&self) -> Watermark {
        match self.records.back() {
            Some(record) => record.watermark,
            None => Watermark::new(self.sequence),
        }
    }

    pub fn record(
        &mut self,
        mutation: MutationKind,
        invalidated: usize,
    ) -> InvalidationRecord {
        self.sequence += 1;
        let record = InvalidationRecord {
            watermark: Watermark::new(self.sequence),
            resources: mutation.resources(),
            mutation,
            invalidated,
        };
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());
        record
    }

    /// Whether any invalidation touching `resources` happened after
    /// `watermark`. An empty slice matches every resource.
    ///
    /// If the log no longer reaches back to `watermark`, the answer is
    /// conservatively `true`.
    pub fn changes_since(&self, watermark: &Watermark, resources: &[Resource]) -> bool {
        if watermark.sequence >= self.sequence {
            return false;
        }
        let oldest_retained = self
            .records
            .front()
            .map(|record| record.watermark.sequence)
            .unwrap_or(self.sequence + 1);
        if watermark.sequence + 1 < oldest_retained {
            return true;
        }
        self.records
            .iter()
            .filter(|record| record.watermark.sequence > watermark.sequence)
            .any(|record| {
                resources.is_empty()
                    || record
                        .resources
                        .iter()
                        .any(|resource| resources.contains(resource))
            })
    }

    /// Retained records strictly after `watermark`, oldest first.
    pub fn records_since(&self, watermark: &Watermark) -> Vec<InvalidationRecord> {
        self.records
            .iter()
            .filter(|record| record.watermark.sequence > watermark.sequence)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Applies the mutation table to a query cache.
#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    cache: QueryCache,
    log: Arc<Mutex<InvalidationLog>>,
}

impl InvalidationCoordinator {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            log: Arc::new(Mutex::new(InvalidationLog::default())),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn log(&self) -> MutexGuard<'_, InvalidationLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark every key the mutation affects as stale.
    ///
    /// Call only once the mutation's response has been observed as a
    /// success; [`InvalidationCoordinator::settle`] enforces that.
    pub fn apply(&self, mutation: &MutationKind) -> InvalidationRecord {
        let effects = mutation.effects();
        let invalidated = self.cache.invalidate(&effects);
        let record = self.log().record(mutation.clone(), invalidated);
        tracing::info!(
            mutation = %mutation,
            patterns = effects.len(),
            invalidated,
            watermark = record.watermark.sequence,
            "applied invalidation"
        );
        record
    }

    /// Apply the mutation's invalidations if and only if `result` is a
    /// success, then hand the result back unchanged.
    pub fn settle<T>(&self, mutation: &MutationKind, result: SyncResult<T>) -> SyncResult<T> {
        match &result {
            Ok(_) => {
                self.apply(mutation);
            }
            Err(err) => {
                tracing::debug!(mutation = %mutation, error = %err, "mutation failed, cache untouched");
            }
        }
        result
    }

    pub fn current_watermark(&self) -> Watermark {
        self.log().current_watermark()
    }

    pub fn changes_since(&self, watermark: &Watermark, resources: &[Resource]) -> bool {
        self.log().changes_since(watermark, resources)
    }

    pub fn records_since(&self, watermark: &Watermark) -> Vec<InvalidationRecord> {
        self.log().records_since(watermark)
    }
}

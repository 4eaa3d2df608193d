//! Entity payloads exchanged with the feedback backend.
//!
//! These are immutable snapshots: the cache hands them out behind `Arc`
//! and consumers never mutate a payload they did not build themselves.

use crate::enums::{
    InputStatus, InquiryStatus, RevealState, Sentiment, Severity, TopicStatus, UserRole,
};
use crate::identity::{
    DepartmentId, InputId, InquiryId, ProgramId, ReplyId, SemesterId, ThemeId, Timestamp, TopicId,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// INPUTS
// ============================================================================

/// Minimal author information attached to non-anonymous content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A feedback submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub id: InputId,
    pub body: String,
    /// Hidden by the server for anonymous submissions until a reveal is approved.
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub status: InputStatus,
    #[serde(default)]
    pub inquiry_id: Option<InquiryId>,
    /// Weak back-reference; the topic owns the relationship.
    #[serde(default)]
    pub topic_id: Option<TopicId>,
    #[serde(default)]
    pub theme_id: Option<ThemeId>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub reveal_state: RevealState,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl Input {
    /// An input counts as anonymous when flagged so or when no author is attached.
    pub fn is_anonymous(&self) -> bool {
        self.anonymous || self.author.is_none()
    }

    /// Whether the AI analysis fields can be trusted for display.
    pub fn has_analysis(&self) -> bool {
        self.status == InputStatus::Processed
    }
}

/// A reply on an input thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: ReplyId,
    pub input_id: InputId,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    pub body: String,
    pub created_at: Timestamp,
}

// ============================================================================
// INQUIRIES
// ============================================================================

/// Audience targeting for an inquiry. Empty lists mean "everyone".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceFilter {
    #[serde(default)]
    pub department_ids: Vec<DepartmentId>,
    #[serde(default)]
    pub program_ids: Vec<ProgramId>,
    #[serde(default)]
    pub semester_ids: Vec<SemesterId>,
}

/// An admin-authored prompt that students respond to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: InquiryId,
    pub title: String,
    #[serde(alias = "body")]
    pub prompt: String,
    #[serde(default)]
    pub status: InquiryStatus,
    #[serde(default)]
    pub closed_at: Option<Timestamp>,
    #[serde(default)]
    pub audience: AudienceFilter,
    pub created_at: Timestamp,
}

// ============================================================================
// TOPICS
// ============================================================================

/// One entry in a topic's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStatusEvent {
    pub status: TopicStatus,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub message: Option<String>,
    pub at: Timestamp,
}

/// A cluster of related inputs with an optional generated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    /// `None` until summary generation completes.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: TopicStatus,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    history: Vec<TopicStatusEvent>,
    pub created_at: Timestamp,
}

impl Topic {
    pub fn new(id: TopicId, title: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id,
            title: title.into(),
            summary: None,
            status: TopicStatus::Open,
            inputs: Vec::new(),
            history: Vec::new(),
            created_at,
        }
    }

    /// Status history, oldest first.
    pub fn history(&self) -> &[TopicStatusEvent] {
        &self.history
    }

    /// Set the current status and append the change to the history.
    pub fn apply_status_update(
        &mut self,
        status: TopicStatus,
        author: Option<AuthorRef>,
        message: Option<String>,
        at: Timestamp,
    ) {
        self.status = status;
        self.history.push(TopicStatusEvent {
            status,
            author,
            message,
            at,
        });
    }

    pub fn is_archived(&self) -> bool {
        self.status == TopicStatus::Archived
    }
}

// ============================================================================
// DIRECTORY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub department_id: DepartmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: SemesterId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// One page of a paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "data")]
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    #[serde(alias = "limit")]
    pub page_size: u32,
}

/// Server-side aggregate over inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStats {
    pub total: u64,
    #[serde(default)]
    pub by_status: BTreeMap<InputStatus, u64>,
    #[serde(default)]
    pub by_sentiment: BTreeMap<Sentiment, u64>,
    #[serde(default)]
    pub by_severity: BTreeMap<Severity, u64>,
    #[serde(default)]
    pub average_quality: Option<f64>,
}

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInput {
    pub body: String,
    pub anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiry_id: Option<InquiryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<ThemeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<ThemeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<TopicId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealResponse {
    pub approve: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryDraft {
    pub title: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<Timestamp>,
    #[serde(default)]
    pub audience: AudienceFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStatusChange {
    pub status: TopicStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Create/update payload for the directory resources (departments,
/// programs, semesters, themes). Fields a resource does not use are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
}

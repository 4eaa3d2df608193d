//! Hearken Core - Domain Model
//!
//! Payload types, typed identifiers, normalized filter sets, the error
//! taxonomy, workflow guards, and derived-view projections. Everything here
//! is synchronous and free of I/O; the cache and client crates build on it.

pub mod entities;
pub mod enums;
pub mod error;
pub mod filter;
pub mod identity;
pub mod projection;
pub mod workflow;

pub use entities::{
    AudienceFilter, AuthorRef, Department, DirectoryDraft, Input, InputStats, InputUpdate,
    Inquiry, InquiryDraft, NewInput, NewReply, Page, Program, Reply, RevealResponse, Semester,
    Theme, Topic, TopicStatusChange, TopicStatusEvent, TopicUpdate, User, UserDraft,
};
pub use enums::{
    EnumParseError, InputStatus, InquiryStatus, RevealAction, RevealState, Sentiment, Severity,
    TopicStatus, UserRole,
};
pub use error::{FieldErrors, GuardRejection, SyncError, SyncResult};
pub use filter::{
    DirectoryFilters, FilterSet, FilterValue, InputFilters, InquiryFilters, IntoFilterSet,
    PageRequest, SortOrder, TopicFilters,
};
pub use identity::{
    DepartmentId, EntityIdType, InputId, InquiryId, ProgramId, ReplyId, SemesterId,
    ThemeId, Timestamp, TopicId, UserId,
};
pub use projection::{
    BreakdownSource, PaginationMeta, QualityAverage, SentimentBreakdown, SeverityBreakdown,
    StatsOverview, TopicOverview,
};
pub use workflow::{
    GenerationGuard, InFlightGuard, InFlightSet, RevealLedger, RevealReservation,
    RevealsInFlight, StatusLedger, SummaryGenerations,
};

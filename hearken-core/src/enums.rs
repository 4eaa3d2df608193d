//! Enum types for Hearken entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// INPUT LIFECYCLE
// ============================================================================

/// Processing status of a submitted input.
///
/// Analysis runs asynchronously on the server, so the client only ever
/// observes this value. Ordering is Pending < Processing < {Processed, Failed}.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputStatus {
    #[default]
    Pending,
    Processing,
    Processed,
    Failed,
}

impl InputStatus {
    pub const ALL: [InputStatus; 4] = [
        InputStatus::Pending,
        InputStatus::Processing,
        InputStatus::Processed,
        InputStatus::Failed,
    ];

    /// Convert to wire string representation.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            InputStatus::Pending => "PENDING",
            InputStatus::Processing => "PROCESSING",
            InputStatus::Processed => "PROCESSED",
            InputStatus::Failed => "FAILED",
        }
    }

    /// Parse from wire string representation (case-insensitive).
    pub fn from_wire_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(InputStatus::Pending),
            "processing" => Ok(InputStatus::Processing),
            "processed" => Ok(InputStatus::Processed),
            "failed" => Ok(InputStatus::Failed),
            _ => Err(EnumParseError::new("input status", s)),
        }
    }

    /// Position in the forward-only lifecycle.
    pub fn rank(&self) -> u8 {
        match self {
            InputStatus::Pending => 0,
            InputStatus::Processing => 1,
            InputStatus::Processed | InputStatus::Failed => 2,
        }
    }

    /// Whether analysis has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Fold a newly observed status into the last known one.
    ///
    /// Observations that would move the status backwards are ignored, so
    /// local gating never assumes less progress than already seen and never
    /// more than the server reported.
    pub fn observe(self, observed: InputStatus) -> InputStatus {
        if observed.rank() >= self.rank() {
            observed
        } else {
            self
        }
    }
}

impl fmt::Display for InputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for InputStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

// ============================================================================
// REVEAL PROTOCOL
// ============================================================================

/// State of the anonymous-identity reveal negotiation on an input.
///
/// ```text
/// NotRequested ── request ──→ Pending ── approve ──→ Approved
///                                │
///                                └──── deny ───────→ Denied
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevealState {
    #[default]
    NotRequested,
    Pending,
    Approved,
    Denied,
}

/// Action that drives the reveal state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevealAction {
    /// Admin asks the author to disclose their identity.
    Request,
    /// Author agrees to disclose.
    Approve,
    /// Author declines.
    Deny,
}

impl RevealState {
    pub const ALL: [RevealState; 4] = [
        RevealState::NotRequested,
        RevealState::Pending,
        RevealState::Approved,
        RevealState::Denied,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            RevealState::NotRequested => "NOT_REQUESTED",
            RevealState::Pending => "PENDING",
            RevealState::Approved => "APPROVED",
            RevealState::Denied => "DENIED",
        }
    }

    pub fn from_wire_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "not_requested" | "none" => Ok(RevealState::NotRequested),
            "pending" => Ok(RevealState::Pending),
            "approved" => Ok(RevealState::Approved),
            "denied" => Ok(RevealState::Denied),
            _ => Err(EnumParseError::new("reveal state", s)),
        }
    }

    /// Approved and Denied end the negotiation for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RevealState::Approved | RevealState::Denied)
    }

    /// Apply an action, returning the next state or `None` when the
    /// transition is not part of the protocol.
    pub fn apply(self, action: RevealAction) -> Option<RevealState> {
        match (self, action) {
            (RevealState::NotRequested, RevealAction::Request) => Some(RevealState::Pending),
            (RevealState::Pending, RevealAction::Approve) => Some(RevealState::Approved),
            (RevealState::Pending, RevealAction::Deny) => Some(RevealState::Denied),
            _ => None,
        }
    }
}

impl fmt::Display for RevealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for RevealState {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

// ============================================================================
// INQUIRIES
// ============================================================================

/// Lifecycle of an inquiry. `Active` is also reported as `SENT` by some
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryStatus {
    #[default]
    Draft,
    #[serde(alias = "SENT")]
    Active,
    Closed,
}

impl InquiryStatus {
    pub const ALL: [InquiryStatus; 3] = [
        InquiryStatus::Draft,
        InquiryStatus::Active,
        InquiryStatus::Closed,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            InquiryStatus::Draft => "DRAFT",
            InquiryStatus::Active => "ACTIVE",
            InquiryStatus::Closed => "CLOSED",
        }
    }

    pub fn from_wire_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(InquiryStatus::Draft),
            "active" | "sent" => Ok(InquiryStatus::Active),
            "closed" => Ok(InquiryStatus::Closed),
            _ => Err(EnumParseError::new("inquiry status", s)),
        }
    }
}

impl fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for InquiryStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

// ============================================================================
// TOPICS
// ============================================================================

/// Triage status of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicStatus {
    #[default]
    Open,
    Acknowledged,
    InProgress,
    Resolved,
    Archived,
}

impl TopicStatus {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            TopicStatus::Open => "OPEN",
            TopicStatus::Acknowledged => "ACKNOWLEDGED",
            TopicStatus::InProgress => "IN_PROGRESS",
            TopicStatus::Resolved => "RESOLVED",
            TopicStatus::Archived => "ARCHIVED",
        }
    }

    pub fn from_wire_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "open" => Ok(TopicStatus::Open),
            "acknowledged" => Ok(TopicStatus::Acknowledged),
            "in_progress" => Ok(TopicStatus::InProgress),
            "resolved" => Ok(TopicStatus::Resolved),
            "archived" => Ok(TopicStatus::Archived),
            _ => Err(EnumParseError::new("topic status", s)),
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for TopicStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// AI-derived sentiment of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// AI-derived importance (severity) of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Student,
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_status_observe_is_monotonic() {
        let status = InputStatus::Processing;
        assert_eq!(status.observe(InputStatus::Pending), InputStatus::Processing);
        assert_eq!(status.observe(InputStatus::Processed), InputStatus::Processed);
        assert_eq!(
            InputStatus::Processed.observe(InputStatus::Processing),
            InputStatus::Processed
        );
    }

    #[test]
    fn test_reveal_transitions() {
        assert_eq!(
            RevealState::NotRequested.apply(RevealAction::Request),
            Some(RevealState::Pending)
        );
        assert_eq!(
            RevealState::Pending.apply(RevealAction::Approve),
            Some(RevealState::Approved)
        );
        assert_eq!(
            RevealState::Pending.apply(RevealAction::Deny),
            Some(RevealState::Denied)
        );
        assert_eq!(RevealState::Pending.apply(RevealAction::Request), None);
        assert_eq!(RevealState::Approved.apply(RevealAction::Deny), None);
        assert_eq!(RevealState::NotRequested.apply(RevealAction::Approve), None);
    }

    #[test]
    fn test_inquiry_status_accepts_sent_alias() {
        let status: InquiryStatus = serde_json::from_str("\"SENT\"").unwrap();
        assert_eq!(status, InquiryStatus::Active);
        assert_eq!("sent".parse::<InquiryStatus>().unwrap(), InquiryStatus::Active);
    }

    #[test]
    fn test_reveal_state_wire_format() {
        let json = serde_json::to_string(&RevealState::NotRequested).unwrap();
        assert_eq!(json, "\"NOT_REQUESTED\"");
        assert_eq!(
            "not-requested".parse::<RevealState>().unwrap(),
            RevealState::NotRequested
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = "bogus".parse::<TopicStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid topic status: bogus");
    }
}

//! Hearken Test Utilities
//!
//! Shared test infrastructure for the Hearken workspace:
//! - Proptest generators for domain types and mutations
//! - A scriptable query fetcher for cache tests
//! - Fixtures for common scenarios

pub use hearken_cache::{
    CacheKey, DirectoryKind, KeyPattern, MutationKind, QueryCache, QueryFetcher, Resource,
};
pub use hearken_core::{
    AudienceFilter, AuthorRef, EntityIdType, Input, InputFilters, InputId, InputStats,
    InputStatus, Inquiry, InquiryId, InquiryStatus, RevealState, Sentiment, Severity, SyncError,
    SyncResult, ThemeId, Timestamp, Topic, TopicId, UserId,
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// MOCK FETCHER
// ============================================================================

/// Query fetcher answering from a per-resource script and counting calls.
///
/// Resources without a scripted answer echo the key back, so every key gets
/// a distinct payload.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<Resource, SyncResult<Value>>>,
    calls: Mutex<HashMap<CacheKey, usize>>,
    total: AtomicUsize,
    delay: Duration,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn respond(&self, resource: Resource, response: SyncResult<Value>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource, response);
    }

    pub fn calls_for(&self, key: &CacheKey) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryFetcher for MockFetcher {
    async fn fetch(&self, key: &CacheKey) -> SyncResult<Value> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.total.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.resource())
            .cloned();
        scripted.unwrap_or_else(|| Ok(json!({ "key": key.to_string(), "call": call })))
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Hearken domain types.

    use super::*;
    use proptest::prelude::*;

    // === Identity Type Generators ===

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_input_id() -> impl Strategy<Value = InputId> {
        arb_uuid().prop_map(InputId::new)
    }

    pub fn arb_inquiry_id() -> impl Strategy<Value = InquiryId> {
        arb_uuid().prop_map(InquiryId::new)
    }

    pub fn arb_topic_id() -> impl Strategy<Value = TopicId> {
        arb_uuid().prop_map(TopicId::new)
    }

    pub fn arb_theme_id() -> impl Strategy<Value = ThemeId> {
        arb_uuid().prop_map(ThemeId::new)
    }

    /// Generate a Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    // === Enum Generators ===

    pub fn arb_input_status() -> impl Strategy<Value = InputStatus> {
        prop::sample::select(InputStatus::ALL.to_vec())
    }

    pub fn arb_reveal_state() -> impl Strategy<Value = RevealState> {
        prop::sample::select(RevealState::ALL.to_vec())
    }

    pub fn arb_inquiry_status() -> impl Strategy<Value = InquiryStatus> {
        prop::sample::select(InquiryStatus::ALL.to_vec())
    }

    pub fn arb_sentiment() -> impl Strategy<Value = Sentiment> {
        prop::sample::select(Sentiment::ALL.to_vec())
    }

    pub fn arb_severity() -> impl Strategy<Value = Severity> {
        prop::sample::select(Severity::ALL.to_vec())
    }

    pub fn arb_directory_kind() -> impl Strategy<Value = DirectoryKind> {
        prop::sample::select(DirectoryKind::ALL.to_vec())
    }

    // === Entity Generators ===

    /// An inquiry with an optional close time within a year of 2025-01-01.
    pub fn arb_inquiry() -> impl Strategy<Value = Inquiry> {
        (
            arb_inquiry_id(),
            arb_inquiry_status(),
            prop::option::of(-31_536_000i64..31_536_000i64),
        )
            .prop_map(|(id, status, close_offset)| {
                let base = fixtures::reference_time();
                Inquiry {
                    id,
                    title: "Generated inquiry".to_string(),
                    prompt: "What should we improve?".to_string(),
                    status,
                    closed_at: close_offset.map(|secs| base + chrono::Duration::seconds(secs)),
                    audience: AudienceFilter::default(),
                    created_at: base,
                }
            })
    }

    pub fn arb_input() -> impl Strategy<Value = Input> {
        (
            arb_input_id(),
            any::<bool>(),
            any::<bool>(),
            arb_input_status(),
            arb_reveal_state(),
            prop::option::of(arb_sentiment()),
            prop::option::of(arb_severity()),
            prop::option::of(0.0f64..5.0),
        )
            .prop_map(
                |(id, anonymous, has_author, status, reveal_state, sentiment, severity, quality)| {
                    let mut input = fixtures::input(id, anonymous);
                    if !has_author {
                        input.author = None;
                    }
                    input.status = status;
                    input.reveal_state = reveal_state;
                    input.sentiment = sentiment;
                    input.severity = severity;
                    input.quality_score = quality;
                    input
                },
            )
    }

    /// Free text with random surrounding whitespace.
    pub fn arb_padded_text() -> impl Strategy<Value = (String, String)> {
        ("[a-z]{1,12}", "[ \t]{0,3}", "[ \t]{0,3}").prop_map(|(core, left, right)| {
            let padded = format!("{}{}{}", left, core, right);
            (core, padded)
        })
    }

    pub fn arb_input_filters() -> impl Strategy<Value = InputFilters> {
        (
            prop::option::of(arb_input_status()),
            prop::option::of(arb_sentiment()),
            prop::option::of(arb_severity()),
            prop::collection::vec(arb_theme_id(), 0..4),
            prop::option::of("[a-z ]{0,10}"),
        )
            .prop_map(|(status, sentiment, severity, theme_ids, search)| InputFilters {
                status,
                sentiment,
                severity,
                theme_ids,
                search,
                ..Default::default()
            })
    }

    pub fn arb_mutation_kind() -> impl Strategy<Value = MutationKind> {
        (arb_uuid(), arb_uuid(), arb_directory_kind()).prop_flat_map(|(a, b, kind)| {
            prop::sample::select(fixtures::every_mutation(a, b, kind))
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// Fixed instant used where tests need reproducible times.
    pub fn reference_time() -> Timestamp {
        chrono::DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_else(Utc::now)
    }

    pub fn author() -> AuthorRef {
        AuthorRef {
            id: UserId::new(Uuid::from_u128(7)),
            name: "Ada Student".to_string(),
            email: Some("ada@example.edu".to_string()),
        }
    }

    /// A pending input; anonymous inputs carry no author.
    pub fn input(id: InputId, anonymous: bool) -> Input {
        Input {
            id,
            body: "The library closes too early during exams".to_string(),
            author: if anonymous { None } else { Some(author()) },
            anonymous,
            status: InputStatus::Pending,
            inquiry_id: None,
            topic_id: None,
            theme_id: None,
            sentiment: None,
            severity: None,
            quality_score: None,
            reveal_state: RevealState::NotRequested,
            created_at: reference_time(),
            updated_at: None,
        }
    }

    pub fn anonymous_input() -> Input {
        input(InputId::now_v7(), true)
    }

    pub fn analysed_input(sentiment: Sentiment, severity: Severity, quality: f64) -> Input {
        Input {
            status: InputStatus::Processed,
            sentiment: Some(sentiment),
            severity: Some(severity),
            quality_score: Some(quality),
            ..input(InputId::now_v7(), true)
        }
    }

    pub fn inquiry(status: InquiryStatus, closed_at: Option<Timestamp>) -> Inquiry {
        Inquiry {
            id: InquiryId::now_v7(),
            title: "Campus dining".to_string(),
            prompt: "How was your week?".to_string(),
            status,
            closed_at,
            audience: AudienceFilter::default(),
            created_at: reference_time(),
        }
    }

    pub fn topic_with_inputs(inputs: Vec<Input>) -> Topic {
        let mut topic = Topic::new(TopicId::now_v7(), "Library hours", reference_time());
        topic.inputs = inputs;
        topic
    }

    /// One instance of every mutation kind. Directory mutations use `kind`.
    pub fn every_mutation(a: Uuid, b: Uuid, kind: DirectoryKind) -> Vec<MutationKind> {
        vec![
            MutationKind::InputSubmitted { id: None },
            MutationKind::InputSubmitted {
                id: Some(InputId::new(a)),
            },
            MutationKind::InputUpdated { id: InputId::new(a) },
            MutationKind::InputDeleted { id: InputId::new(a) },
            MutationKind::InputStatusChanged { id: InputId::new(a) },
            MutationKind::InputLinkedToTopic {
                input_id: InputId::new(a),
                topic_id: TopicId::new(b),
            },
            MutationKind::RevealRequested { id: InputId::new(a) },
            MutationKind::RevealResponded { id: InputId::new(a) },
            MutationKind::ReplyCreated {
                input_id: InputId::new(a),
            },
            MutationKind::CsvImported,
            MutationKind::InquiryCreated { id: None },
            MutationKind::InquiryCreated {
                id: Some(InquiryId::new(a)),
            },
            MutationKind::InquiryUpdated { id: InquiryId::new(a) },
            MutationKind::InquirySent { id: InquiryId::new(a) },
            MutationKind::InquiryClosed { id: InquiryId::new(a) },
            MutationKind::InquiryDeleted { id: InquiryId::new(a) },
            MutationKind::TopicUpdated { id: TopicId::new(b) },
            MutationKind::TopicStatusChanged { id: TopicId::new(b) },
            MutationKind::TopicArchived { id: TopicId::new(b) },
            MutationKind::TopicSummaryRegenerated { id: TopicId::new(b) },
            MutationKind::DirectoryCreated { kind, id: None },
            MutationKind::DirectoryCreated { kind, id: Some(a) },
            MutationKind::DirectoryUpdated { kind, id: a },
            MutationKind::DirectoryDeleted { kind, id: a },
        ]
    }

    pub fn sample_stats() -> InputStats {
        let mut stats = InputStats {
            total: 12,
            average_quality: Some(3.5),
            ..Default::default()
        };
        stats.by_status.insert(InputStatus::Processed, 10);
        stats.by_status.insert(InputStatus::Pending, 2);
        stats.by_sentiment.insert(Sentiment::Positive, 4);
        stats.by_sentiment.insert(Sentiment::Negative, 6);
        stats.by_severity.insert(Severity::High, 3);
        stats.by_severity.insert(Severity::Low, 7);
        stats
    }
}

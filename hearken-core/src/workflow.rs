//! Workflow guards.
//!
//! Pure predicates evaluated before a mutation is dispatched. The server is
//! the source of truth; these only stop actions the client already knows are
//! invalid. Each `can_*` predicate has a `check_*` twin that explains the
//! refusal with a [`GuardRejection`].

use crate::entities::{Input, Inquiry, Topic};
use crate::enums::{InputStatus, InquiryStatus, RevealState};
use crate::error::GuardRejection;
use crate::identity::{InputId, Timestamp, TopicId};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

// ============================================================================
// INQUIRIES
// ============================================================================

/// A response may be submitted only while the inquiry is active and its
/// close time, if any, is still in the future.
pub fn can_submit_response(inquiry: &Inquiry, now: Timestamp) -> bool {
    check_submit_response(inquiry, now).is_ok()
}

pub fn check_submit_response(inquiry: &Inquiry, now: Timestamp) -> Result<(), GuardRejection> {
    match inquiry.status {
        InquiryStatus::Active => match inquiry.closed_at {
            Some(closed_at) if closed_at <= now => Err(GuardRejection::InquiryClosed),
            _ => Ok(()),
        },
        InquiryStatus::Closed => Err(GuardRejection::InquiryClosed),
        status @ InquiryStatus::Draft => Err(GuardRejection::InquiryNotActive { status }),
    }
}

pub fn can_send_inquiry(inquiry: &Inquiry) -> bool {
    check_send_inquiry(inquiry).is_ok()
}

pub fn check_send_inquiry(inquiry: &Inquiry) -> Result<(), GuardRejection> {
    match inquiry.status {
        InquiryStatus::Draft => Ok(()),
        status => Err(GuardRejection::InquiryNotDraft { status }),
    }
}

pub fn can_close_inquiry(inquiry: &Inquiry) -> bool {
    check_close_inquiry(inquiry).is_ok()
}

pub fn check_close_inquiry(inquiry: &Inquiry) -> Result<(), GuardRejection> {
    match inquiry.status {
        InquiryStatus::Active => Ok(()),
        status => Err(GuardRejection::InquiryNotClosable { status }),
    }
}

pub fn can_edit_inquiry(inquiry: &Inquiry) -> bool {
    check_edit_inquiry(inquiry).is_ok()
}

pub fn check_edit_inquiry(inquiry: &Inquiry) -> Result<(), GuardRejection> {
    if inquiry.status == InquiryStatus::Closed {
        return Err(GuardRejection::InquiryLocked);
    }
    Ok(())
}

// ============================================================================
// REVEAL PROTOCOL
// ============================================================================

/// A reveal can only be initiated on an anonymous input that has never been
/// asked before.
pub fn can_request_reveal(input: &Input) -> bool {
    check_request_reveal(input).is_ok()
}

pub fn check_request_reveal(input: &Input) -> Result<(), GuardRejection> {
    if !input.is_anonymous() {
        return Err(GuardRejection::NotAnonymous);
    }
    match input.reveal_state {
        RevealState::NotRequested => Ok(()),
        state => Err(GuardRejection::RevealAlreadyRequested { state }),
    }
}

/// The author may only answer a request that is still pending.
pub fn can_respond_to_reveal(input: &Input) -> bool {
    check_respond_to_reveal(input).is_ok()
}

pub fn check_respond_to_reveal(input: &Input) -> Result<(), GuardRejection> {
    match input.reveal_state {
        RevealState::Pending => Ok(()),
        state => Err(GuardRejection::NoPendingReveal { state }),
    }
}

fn reveal_progress(state: RevealState) -> u8 {
    match state {
        RevealState::NotRequested => 0,
        RevealState::Pending => 1,
        RevealState::Approved | RevealState::Denied => 2,
    }
}

/// Reveal states this client has already moved forward.
///
/// A list payload fetched before a reveal request still says
/// `NotRequested`; folding it through the ledger keeps the guard from
/// letting a second request reach the server.
#[derive(Debug, Default)]
pub struct RevealLedger {
    confirmed: HashMap<InputId, RevealState>,
}

impl RevealLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: InputId, state: RevealState) {
        let entry = self.confirmed.entry(id).or_insert(state);
        if reveal_progress(state) > reveal_progress(*entry) {
            *entry = state;
        }
    }

    /// The further along of the payload's state and the recorded one.
    pub fn effective_state(&self, input: &Input) -> RevealState {
        match self.confirmed.get(&input.id) {
            Some(&local) if reveal_progress(local) > reveal_progress(input.reveal_state) => local,
            _ => input.reveal_state,
        }
    }

    pub fn check_request(&self, input: &Input) -> Result<(), GuardRejection> {
        check_request_reveal(&self.view(input))
    }

    pub fn check_respond(&self, input: &Input) -> Result<(), GuardRejection> {
        check_respond_to_reveal(&self.view(input))
    }

    fn view(&self, input: &Input) -> Input {
        Input {
            reveal_state: self.effective_state(input),
            ..input.clone()
        }
    }
}

// ============================================================================
// INPUTS
// ============================================================================

/// Keep the furthest status seen so far.
pub fn observe_status(last_observed: Option<InputStatus>, observed: InputStatus) -> InputStatus {
    match last_observed {
        Some(current) => current.observe(observed),
        None => observed,
    }
}

/// Linking to a topic relies on analysis results.
pub fn can_use_analysis(status: InputStatus) -> bool {
    check_analysis_ready(status).is_ok()
}

pub fn check_analysis_ready(status: InputStatus) -> Result<(), GuardRejection> {
    if status == InputStatus::Processed {
        Ok(())
    } else {
        Err(GuardRejection::AnalysisNotReady { status })
    }
}

pub fn check_reply_body(body: &str) -> Result<(), GuardRejection> {
    if body.trim().is_empty() {
        return Err(GuardRejection::EmptyField { field: "Reply" });
    }
    Ok(())
}

pub fn check_input_body(body: &str) -> Result<(), GuardRejection> {
    if body.trim().is_empty() {
        return Err(GuardRejection::EmptyField { field: "Feedback" });
    }
    Ok(())
}

/// Last observed status per input, folded monotonically.
///
/// Gating decisions read from here rather than from whichever payload
/// happened to arrive last, so an out-of-order list response can never make
/// the UI regress.
#[derive(Debug, Default)]
pub struct StatusLedger {
    observed: HashMap<InputId, InputStatus>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an observation in and return the effective status.
    pub fn observe(&mut self, id: InputId, status: InputStatus) -> InputStatus {
        let effective = observe_status(self.effective(id), status);
        self.observed.insert(id, effective);
        effective
    }

    /// Convenience for a whole input payload.
    pub fn observe_input(&mut self, input: &Input) -> InputStatus {
        self.observe(input.id, input.status)
    }

    pub fn effective(&self, id: InputId) -> Option<InputStatus> {
        self.observed.get(&id).copied()
    }

    pub fn forget(&mut self, id: InputId) {
        self.observed.remove(&id);
    }
}

// ============================================================================
// TOPICS
// ============================================================================

pub fn check_topic_mutable(topic: &Topic) -> Result<(), GuardRejection> {
    if topic.is_archived() {
        return Err(GuardRejection::TopicArchived);
    }
    Ok(())
}

/// Summary regeneration is never restricted by topic state; concurrency is
/// handled by [`SummaryGenerations`].
pub fn can_regenerate_summary(_topic: &Topic) -> bool {
    true
}

/// Keys with an operation in flight.
///
/// Transient UI state, never cache state. A key is held by the
/// [`InFlightGuard`] returned from [`InFlightSet::try_begin`] and released
/// when that guard drops, whether the operation succeeded, failed, or was
/// cancelled.
#[derive(Debug)]
pub struct InFlightSet<K: Eq + Hash> {
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash> Default for InFlightSet<K> {
    fn default() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash> Clone for InFlightSet<K> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<K: Eq + Hash + Copy> InFlightSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `key`, or `None` if it is already held.
    pub fn try_begin(&self, key: K) -> Option<InFlightGuard<K>> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key) {
            return None;
        }
        Some(InFlightGuard {
            key,
            keys: Arc::clone(&self.keys),
        })
    }

    pub fn contains(&self, key: K) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct InFlightGuard<K: Eq + Hash> {
    key: K,
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash + Copy> InFlightGuard<K> {
    pub fn key(&self) -> K {
        self.key
    }
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub type GenerationGuard = InFlightGuard<TopicId>;
pub type RevealReservation = InFlightGuard<InputId>;

/// Topics with a summary generation in flight.
#[derive(Debug, Clone, Default)]
pub struct SummaryGenerations {
    in_flight: InFlightSet<TopicId>,
}

impl SummaryGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a generation as started.
    pub fn begin(&self, topic_id: TopicId) -> Result<GenerationGuard, GuardRejection> {
        self.in_flight
            .try_begin(topic_id)
            .ok_or(GuardRejection::SummaryGenerationInFlight)
    }

    pub fn is_in_flight(&self, topic_id: TopicId) -> bool {
        self.in_flight.contains(topic_id)
    }
}

/// Inputs with a reveal request or response on the wire.
///
/// Reserved before the [`RevealLedger`] check so a second call on the same
/// input is refused even while the first has not yet been recorded.
#[derive(Debug, Clone, Default)]
pub struct RevealsInFlight {
    in_flight: InFlightSet<InputId>,
}

impl RevealsInFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, input_id: InputId) -> Result<RevealReservation, GuardRejection> {
        self.in_flight
            .try_begin(input_id)
            .ok_or(GuardRejection::RevealInFlight)
    }

    pub fn is_in_flight(&self, input_id: InputId) -> bool {
        self.in_flight.contains(input_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::AudienceFilter;
    use crate::identity::{EntityIdType, InquiryId};
    use chrono::{Duration, Utc};

    fn inquiry(status: InquiryStatus, closed_at: Option<Timestamp>) -> Inquiry {
        Inquiry {
            id: InquiryId::now_v7(),
            title: "Dining hall".to_string(),
            prompt: "How was lunch?".to_string(),
            status,
            closed_at,
            audience: AudienceFilter::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_without_close_accepts() {
        assert!(can_submit_response(&inquiry(InquiryStatus::Active, None), Utc::now()));
    }

    #[test]
    fn test_active_with_future_close_accepts() {
        let now = Utc::now();
        let inq = inquiry(InquiryStatus::Active, Some(now + Duration::hours(1)));
        assert!(can_submit_response(&inq, now));
    }

    #[test]
    fn test_active_with_past_close_rejects() {
        let now = Utc::now();
        let inq = inquiry(InquiryStatus::Active, Some(now - Duration::seconds(1)));
        assert_eq!(
            check_submit_response(&inq, now),
            Err(GuardRejection::InquiryClosed)
        );
    }

    #[test]
    fn test_close_time_equal_to_now_rejects() {
        let now = Utc::now();
        let inq = inquiry(InquiryStatus::Active, Some(now));
        assert!(!can_submit_response(&inq, now));
    }

    #[test]
    fn test_closed_rejects_even_with_future_close() {
        let now = Utc::now();
        let inq = inquiry(InquiryStatus::Closed, Some(now + Duration::days(3)));
        assert!(!can_submit_response(&inq, now));
    }

    #[test]
    fn test_send_and_close_guards() {
        assert!(can_send_inquiry(&inquiry(InquiryStatus::Draft, None)));
        assert!(!can_send_inquiry(&inquiry(InquiryStatus::Active, None)));
        assert!(can_close_inquiry(&inquiry(InquiryStatus::Active, None)));
        assert!(!can_close_inquiry(&inquiry(InquiryStatus::Closed, None)));
        assert_eq!(
            check_edit_inquiry(&inquiry(InquiryStatus::Closed, None)),
            Err(GuardRejection::InquiryLocked)
        );
    }

    #[test]
    fn test_reply_body_must_not_be_blank() {
        assert!(check_reply_body("  \n").is_err());
        assert!(check_reply_body("Thanks!").is_ok());
    }

    #[test]
    fn test_status_ledger_never_regresses() {
        let mut ledger = StatusLedger::new();
        let id = InputId::now_v7();
        assert_eq!(ledger.observe(id, InputStatus::Processing), InputStatus::Processing);
        assert_eq!(ledger.observe(id, InputStatus::Pending), InputStatus::Processing);
        assert_eq!(ledger.observe(id, InputStatus::Processed), InputStatus::Processed);
        assert_eq!(ledger.effective(id), Some(InputStatus::Processed));
        assert!(!can_use_analysis(InputStatus::Processing));
        assert!(!can_use_analysis(InputStatus::Failed));
        assert!(can_use_analysis(InputStatus::Processed));
    }

    #[test]
    fn test_reveal_ledger_overrides_older_snapshot() {
        let snapshot = Input {
            id: InputId::now_v7(),
            body: "The library closes too early".to_string(),
            author: None,
            anonymous: true,
            status: InputStatus::Processed,
            inquiry_id: None,
            topic_id: None,
            theme_id: None,
            sentiment: None,
            severity: None,
            quality_score: None,
            reveal_state: RevealState::NotRequested,
            created_at: Utc::now(),
            updated_at: None,
        };
        let mut ledger = RevealLedger::new();
        assert!(ledger.check_request(&snapshot).is_ok());

        ledger.record(snapshot.id, RevealState::Pending);
        assert_eq!(
            ledger.check_request(&snapshot).unwrap_err(),
            GuardRejection::RevealAlreadyRequested {
                state: RevealState::Pending
            }
        );
        assert!(ledger.check_respond(&snapshot).is_ok());

        // A stale record never pulls a newer payload backwards.
        let answered = Input {
            reveal_state: RevealState::Approved,
            ..snapshot.clone()
        };
        assert_eq!(ledger.effective_state(&answered), RevealState::Approved);
    }

    #[test]
    fn test_summary_generation_blocks_while_in_flight() {
        let generations = SummaryGenerations::new();
        let topic_id = TopicId::now_v7();

        let guard = generations.begin(topic_id).unwrap();
        assert!(generations.is_in_flight(topic_id));
        assert_eq!(
            generations.begin(topic_id).unwrap_err(),
            GuardRejection::SummaryGenerationInFlight
        );

        // Other topics are unaffected.
        assert!(generations.begin(TopicId::now_v7()).is_ok());

        drop(guard);
        assert!(!generations.is_in_flight(topic_id));
        assert!(generations.begin(topic_id).is_ok());
    }

    #[test]
    fn test_reveal_reservation_is_per_input_and_released_on_drop() {
        let reveals = RevealsInFlight::new();
        let input_id = InputId::now_v7();

        let reservation = reveals.begin(input_id).unwrap();
        assert_eq!(reservation.key(), input_id);
        assert_eq!(
            reveals.begin(input_id).unwrap_err(),
            GuardRejection::RevealInFlight
        );
        assert!(reveals.begin(InputId::now_v7()).is_ok());

        // Clones share the same set.
        assert!(reveals.clone().is_in_flight(input_id));

        drop(reservation);
        assert!(!reveals.is_in_flight(input_id));
    }
}

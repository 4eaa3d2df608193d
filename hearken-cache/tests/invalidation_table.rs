//! Property tests for the invalidation table.
//!
//! Every mutation must invalidate at least the canonical set of views that
//! display what it changes, and after it is applied every matching key must
//! report stale.

use hearken_cache::{
    CacheKey, DirectoryKind, EntryStatus, InvalidationCoordinator, KeyPattern, MutationKind,
    QueryCache, Resource,
};
use hearken_core::{EntityIdType, InputFilters, InputId, InquiryId, TopicId};
use hearken_test_utils::fixtures::every_mutation;
use hearken_test_utils::generators::{arb_mutation_kind, arb_uuid};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

/// Minimum invalidation set per mutation. The match is exhaustive so a new
/// mutation cannot be added without deciding its canonical views.
fn canonical(mutation: &MutationKind) -> Vec<KeyPattern> {
    use Resource::*;

    let all = KeyPattern::Resource;
    let input = |id: InputId| KeyPattern::instance(InputDetail, id);
    let inquiry = |id: InquiryId| KeyPattern::instance(InquiryDetail, id);
    let topic = |id: TopicId| KeyPattern::instance(TopicDetail, id);

    match mutation {
        MutationKind::InputSubmitted { .. } | MutationKind::CsvImported => {
            vec![all(InputsList), all(MyInputs)]
        }
        MutationKind::InputUpdated { id }
        | MutationKind::InputDeleted { id }
        | MutationKind::InputStatusChanged { id } => vec![all(InputsList), input(*id)],
        MutationKind::InputLinkedToTopic { input_id, topic_id } => {
            vec![all(InputsList), input(*input_id), topic(*topic_id)]
        }
        MutationKind::RevealRequested { id } | MutationKind::RevealResponded { id } => {
            vec![all(InputsList), all(MyInputs), input(*id)]
        }
        MutationKind::ReplyCreated { input_id } => vec![
            KeyPattern::instance(InputReplies, *input_id),
            input(*input_id),
        ],
        MutationKind::InquiryCreated { id } => {
            let mut patterns = vec![all(InquiriesList)];
            patterns.extend(id.map(inquiry));
            patterns
        }
        MutationKind::InquiryUpdated { id }
        | MutationKind::InquirySent { id }
        | MutationKind::InquiryClosed { id }
        | MutationKind::InquiryDeleted { id } => vec![all(InquiriesList), inquiry(*id)],
        MutationKind::TopicUpdated { id }
        | MutationKind::TopicStatusChanged { id }
        | MutationKind::TopicArchived { id }
        | MutationKind::TopicSummaryRegenerated { id } => vec![all(TopicsList), topic(*id)],
        MutationKind::DirectoryCreated { kind, id } => {
            let mut patterns = vec![all(kind.list_resource())];
            patterns.extend(id.map(|id| KeyPattern::Instance {
                resource: kind.detail_resource(),
                id,
            }));
            patterns
        }
        MutationKind::DirectoryUpdated { kind, id } | MutationKind::DirectoryDeleted { kind, id } => {
            vec![
                all(kind.list_resource()),
                KeyPattern::Instance {
                    resource: kind.detail_resource(),
                    id: *id,
                },
            ]
        }
    }
}

/// A concrete key each pattern would select.
fn sample_key(pattern: &KeyPattern) -> CacheKey {
    match pattern {
        KeyPattern::Exact(key) => key.clone(),
        KeyPattern::Instance { resource, id } => {
            hearken_cache::key_for(*resource, Some(*id), None)
        }
        KeyPattern::Resource(resource) => {
            CacheKey::list(*resource, &InputFilters::default())
        }
    }
}

#[test]
fn every_mutation_covers_its_canonical_views() {
    for kind in DirectoryKind::ALL {
        for mutation in every_mutation(Uuid::now_v7(), Uuid::now_v7(), kind) {
            let effects = mutation.effects();
            for required in canonical(&mutation) {
                assert!(
                    effects.iter().any(|effect| effect.covers(&required)),
                    "{} does not invalidate {}",
                    mutation,
                    required
                );
            }
        }
    }
}

#[test]
fn input_affecting_mutations_invalidate_stats() {
    let id = InputId::now_v7();
    for mutation in [
        MutationKind::InputSubmitted { id: None },
        MutationKind::InputUpdated { id },
        MutationKind::InputDeleted { id },
        MutationKind::InputStatusChanged { id },
        MutationKind::CsvImported,
    ] {
        assert!(
            mutation.resources().contains(&Resource::InputStats),
            "{} leaves input-stats fresh",
            mutation
        );
    }
}

#[test]
fn directory_mutations_do_not_leak_into_other_families() {
    for kind in DirectoryKind::ALL {
        let mutation = MutationKind::DirectoryDeleted {
            kind,
            id: Uuid::now_v7(),
        };
        for resource in mutation.resources() {
            assert!(resource == kind.list_resource() || resource == kind.detail_resource());
        }
    }
}

proptest! {
    #[test]
    fn applied_mutation_marks_matching_keys_stale(mutation in arb_mutation_kind()) {
        let coordinator = InvalidationCoordinator::new(QueryCache::default());
        let cache = coordinator.cache();

        let keys: Vec<CacheKey> = canonical(&mutation).iter().map(sample_key).collect();
        for key in &keys {
            cache.write(key, json!({ "cached": true }));
        }

        let record = coordinator.apply(&mutation);
        prop_assert!(record.invalidated >= keys.len());

        for key in &keys {
            prop_assert_eq!(cache.status(key), Some(EntryStatus::Stale));
            let read = cache.read(key);
            prop_assert!(read.is_some_and(|read| read.is_stale()));
        }
    }

    #[test]
    fn unrelated_instances_stay_fresh(a in arb_uuid(), b in arb_uuid()) {
        prop_assume!(a != b);
        let coordinator = InvalidationCoordinator::new(QueryCache::default());
        let other = CacheKey::instance(Resource::InputDetail, InputId::new(b));
        coordinator.cache().write(&other, json!({}));

        coordinator.apply(&MutationKind::InputUpdated { id: InputId::new(a) });
        prop_assert_eq!(coordinator.cache().status(&other), Some(EntryStatus::Fresh));
    }
}

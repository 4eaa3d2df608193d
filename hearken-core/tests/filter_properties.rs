//! Property tests for filter normalization and pagination arithmetic.

use hearken_core::{
    FilterSet, FilterValue, InputFilters, IntoFilterSet, PageRequest, PaginationMeta,
};
use hearken_test_utils::generators::{arb_input_filters, arb_padded_text, arb_theme_id};
use proptest::prelude::*;

proptest! {
    #[test]
    fn surrounding_whitespace_does_not_change_a_filter((core, padded) in arb_padded_text()) {
        let plain = FilterSet::new().with("search", FilterValue::Text(core.clone()));
        let noisy = FilterSet::new().with("search", FilterValue::Text(padded));
        prop_assert_eq!(&plain, &noisy);
        prop_assert_eq!(plain.get("search"), Some(&FilterValue::Text(core)));
    }

    #[test]
    fn list_order_and_duplicates_are_irrelevant(
        ids in prop::collection::vec(arb_theme_id(), 1..6),
    ) {
        let forward = InputFilters { theme_ids: ids.clone(), ..Default::default() };
        let mut doubled: Vec<_> = ids.iter().rev().copied().collect();
        doubled.extend(ids.iter().copied());
        let backward = InputFilters { theme_ids: doubled, ..Default::default() };

        prop_assert_eq!(forward.to_filter_set(), backward.to_filter_set());
    }

    #[test]
    fn blank_search_is_no_filter(blank in "[ \t]{0,4}") {
        let filters = InputFilters { search: Some(blank), ..Default::default() };
        prop_assert!(filters.to_filter_set().is_empty());
    }

    #[test]
    fn filter_sets_render_sorted_query_pairs(filters in arb_input_filters()) {
        let pairs = filters.to_filter_set().to_query_pairs();
        let mut sorted = pairs.clone();
        sorted.sort();
        prop_assert_eq!(pairs.iter().map(|(k, _)| k).collect::<Vec<_>>(),
                        sorted.iter().map(|(k, _)| k).collect::<Vec<_>>());
        prop_assert!(pairs.iter().all(|(_, v)| !v.is_empty()));
    }

    #[test]
    fn pagination_bounds_are_consistent(
        total in 0u64..10_000,
        page in 0u32..200,
        page_size in 1u32..100,
    ) {
        let meta = PaginationMeta::new(total, page, page_size);
        prop_assert!(meta.page >= 1);
        prop_assert_eq!(u64::from(meta.total_pages), total.div_ceil(u64::from(page_size)));
        prop_assert_eq!(meta.has_previous, meta.page > 1);
        prop_assert_eq!(meta.has_next, meta.page < meta.total_pages);

        if meta.first_item == 0 {
            prop_assert_eq!(meta.last_item, 0);
        } else {
            prop_assert!(meta.first_item <= meta.last_item);
            prop_assert!(meta.last_item <= total);
            prop_assert!(meta.last_item - meta.first_item < u64::from(page_size));
        }
    }
}

#[test]
fn page_request_is_part_of_the_filter_identity() {
    let first = InputFilters { page: PageRequest::new(1, 20), ..Default::default() };
    let second = InputFilters { page: PageRequest::new(2, 20), ..Default::default() };
    assert_ne!(first.to_filter_set(), second.to_filter_set());
    assert_eq!(
        first.to_filter_set().get("pageSize"),
        Some(&FilterValue::Int(20))
    );
}

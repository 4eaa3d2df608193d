//! Property tests for sign-in redirect targets and error-body parsing.

use hearken_client::envelope::{field_errors, GENERAL_FIELD};
use hearken_client::navigation::RETURN_PARAM;
use hearken_client::RedirectPolicy;
use proptest::prelude::*;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const SIGN_IN: &str = "/sign-in";

fn policy() -> RedirectPolicy {
    RedirectPolicy::new(SIGN_IN, Duration::from_millis(10))
}

/// App locations other than sign-in, with an optional query string.
fn arb_location() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z0-9]{1,8}", 1..4),
        prop::option::of("[a-z]{1,5}=[a-zA-Z0-9 %&/+]{0,10}"),
    )
        .prop_map(|(segments, query)| {
            let mut location = format!("/app/{}", segments.join("/"));
            if let Some(query) = query {
                location.push('?');
                location.push_str(&query);
            }
            location
        })
}

fn return_to(target: &str) -> Option<String> {
    let url = Url::parse(&format!("http://client.invalid{}", target)).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == RETURN_PARAM)
        .map(|(_, value)| value.into_owned())
}

fn arb_field_messages() -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop::collection::vec("[a-z][a-z ]{0,11}", 1..4),
        0..5,
    )
}

proptest! {
    #[test]
    fn return_location_survives_the_round_trip(location in arb_location()) {
        let target = policy().target_for(&location);
        prop_assert!(target.is_some());
        let target = target.unwrap_or_default();

        prop_assert!(target.starts_with("/sign-in?returnTo="));
        prop_assert_eq!(return_to(&target), Some(location));
    }

    #[test]
    fn sign_in_page_never_redirects(
        query in prop::option::of("[a-z]{1,5}=[a-z0-9%]{0,8}"),
        trailing_slash in any::<bool>(),
    ) {
        let mut location = SIGN_IN.to_string();
        if trailing_slash {
            location.push('/');
        }
        if let Some(query) = query {
            location.push('?');
            location.push_str(&query);
        }
        prop_assert!(policy().is_sign_in(&location));
        prop_assert_eq!(policy().target_for(&location), None);
    }

    #[test]
    fn field_map_shape_is_read_verbatim(expected in arb_field_messages()) {
        let body = serde_json::to_value(&expected).unwrap_or(Value::Null);
        prop_assert_eq!(field_errors(&body), expected);
    }

    #[test]
    fn field_list_shape_groups_by_field(expected in arb_field_messages()) {
        let items: Vec<Value> = expected
            .iter()
            .flat_map(|(field, messages)| {
                messages
                    .iter()
                    .map(move |message| json!({ "field": field, "message": message }))
            })
            .collect();

        prop_assert_eq!(field_errors(&Value::Array(items)), expected);
    }

    #[test]
    fn bare_message_is_a_general_error(message in "[a-z][a-z ]{0,20}[a-z]") {
        let errors = field_errors(&Value::String(format!("  {}  ", message)));
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(&errors[GENERAL_FIELD], &vec![message]);
    }
}

//! Sign-in redirect scheduling.
//!
//! The client does not route; it asks a [`Navigator`] supplied by the UI
//! layer to move to the sign-in entry point after a session teardown.

use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Query parameter carrying the location to return to after sign-in.
pub const RETURN_PARAM: &str = "returnTo";

/// The UI layer's view of the current location and its redirect hook.
pub trait Navigator: Send + Sync {
    /// Current location as path plus optional query, e.g. `/inputs?page=2`.
    fn current_location(&self) -> String;
    fn redirect(&self, target: &str);
}

#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    sign_in_path: String,
    delay: Duration,
}

impl RedirectPolicy {
    pub fn new(sign_in_path: impl Into<String>, delay: Duration) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
            delay,
        }
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether `location` already is the sign-in entry point, ignoring any
    /// query string or trailing slash.
    pub fn is_sign_in(&self, location: &str) -> bool {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        path.trim_end_matches('/') == self.sign_in_path.trim_end_matches('/')
    }

    /// Redirect target for `location`, or `None` when no redirect is needed.
    pub fn target_for(&self, location: &str) -> Option<String> {
        if self.is_sign_in(location) {
            return None;
        }
        let Ok(mut url) = Url::parse("http://client.invalid") else {
            return Some(self.sign_in_path.clone());
        };
        url.set_path(&self.sign_in_path);
        url.query_pairs_mut().append_pair(RETURN_PARAM, location);
        Some(match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        })
    }
}

/// Schedule a delayed redirect to sign-in.
///
/// The location is checked twice: once now, and again when the delay
/// elapses, so a user who reaches sign-in in the meantime is not bounced.
pub fn schedule_sign_in_redirect(
    policy: &RedirectPolicy,
    navigator: Arc<dyn Navigator>,
) -> Option<JoinHandle<()>> {
    let location = navigator.current_location();
    let Some(target) = policy.target_for(&location) else {
        tracing::debug!(location = %location, "already at sign-in, redirect suppressed");
        return None;
    };

    tracing::info!(
        target = %target,
        delay_ms = policy.delay.as_millis() as u64,
        "scheduling sign-in redirect"
    );
    let policy = policy.clone();
    Some(tokio::spawn(async move {
        tokio::time::sleep(policy.delay).await;
        if policy.is_sign_in(&navigator.current_location()) {
            tracing::debug!("reached sign-in before redirect fired");
            return;
        }
        navigator.redirect(&target);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RedirectPolicy {
        RedirectPolicy::new("/sign-in", Duration::from_millis(10))
    }

    #[test]
    fn test_sign_in_location_detection() {
        let policy = policy();
        assert!(policy.is_sign_in("/sign-in"));
        assert!(policy.is_sign_in("/sign-in/"));
        assert!(policy.is_sign_in("/sign-in?returnTo=%2Finputs"));
        assert!(!policy.is_sign_in("/sign-in-help"));
        assert!(!policy.is_sign_in("/inputs"));
    }

    #[test]
    fn test_target_carries_encoded_return_location() {
        let target = policy().target_for("/inputs?status=PENDING").unwrap();
        assert_eq!(target, "/sign-in?returnTo=%2Finputs%3Fstatus%3DPENDING");
        assert!(policy().target_for("/sign-in").is_none());
    }
}

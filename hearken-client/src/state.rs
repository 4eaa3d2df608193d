//! What the presentational layer sees: query snapshots and mutation handles.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use hearken_cache::CacheRead;
use hearken_core::{SyncError, SyncResult};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Snapshot of one query.
///
/// `is_loading` means there is nothing to show yet. `is_fetching` means a
/// request is in flight, possibly behind stale data that is already shown.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_error: bool,
    pub is_stale: bool,
    pub error: Option<SyncError>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    /// Nothing cached and nothing in flight.
    pub fn idle() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_fetching: false,
            is_error: false,
            is_stale: false,
            error: None,
            fetched_at: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            data: None,
            is_loading: true,
            is_fetching: true,
            is_error: false,
            is_stale: false,
            error: None,
            fetched_at: None,
        }
    }

    pub fn from_read(read: CacheRead<T>, is_fetching: bool) -> Self {
        let is_stale = read.is_stale();
        let fetched_at = Some(read.fetched_at());
        Self {
            data: Some(read.into_value()),
            is_loading: false,
            is_fetching,
            is_error: false,
            is_stale,
            error: None,
            fetched_at,
        }
    }

    pub fn from_error(error: SyncError) -> Self {
        Self {
            data: None,
            is_loading: false,
            is_fetching: false,
            is_error: true,
            is_stale: false,
            error: Some(error),
            fetched_at: None,
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        QueryState {
            data: self.data.map(f),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            is_error: self.is_error,
            is_stale: self.is_stale,
            error: self.error,
            fetched_at: self.fetched_at,
        }
    }

    pub fn into_result(self) -> SyncResult<T> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(SyncError::Unknown("query has no data yet".to_string())),
        }
    }
}

type MutationFn<I, O> = dyn Fn(I) -> BoxFuture<'static, SyncResult<O>> + Send + Sync;
type SuccessHook<O> = dyn Fn(&O) + Send + Sync;
type ErrorHook = dyn Fn(&SyncError) + Send + Sync;

#[derive(Debug, Default)]
struct MutationStatus {
    in_flight: usize,
    last_error: Option<SyncError>,
}

/// A mutation bound to its loading/error state and callback hooks.
///
/// `Unauthorized` is returned to the caller but never passed to `on_error`;
/// the pipeline already handled it.
pub struct MutationHandle<I, O> {
    run: Arc<MutationFn<I, O>>,
    status: Arc<Mutex<MutationStatus>>,
    on_success: Option<Arc<SuccessHook<O>>>,
    on_error: Option<Arc<ErrorHook>>,
}

impl<I, O> Clone for MutationHandle<I, O> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            status: Arc::clone(&self.status),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<I, O> fmt::Debug for MutationHandle<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MutationHandle")
            .field("in_flight", &status.in_flight)
            .field("last_error", &status.last_error)
            .finish()
    }
}

impl<I, O> MutationHandle<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<O>> + Send + 'static,
    {
        Self {
            run: Arc::new(move |input| run(input).boxed()),
            status: Arc::new(Mutex::new(MutationStatus::default())),
            on_success: None,
            on_error: None,
        }
    }

    pub fn on_success(mut self, hook: impl Fn(&O) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&SyncError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub async fn mutate(&self, input: I) -> SyncResult<O> {
        {
            let mut status = self.lock();
            status.in_flight += 1;
            status.last_error = None;
        }

        let result = (self.run)(input).await;

        {
            let mut status = self.lock();
            status.in_flight = status.in_flight.saturating_sub(1);
            if let Err(err) = &result {
                status.last_error = Some(err.clone());
            }
        }

        match &result {
            Ok(output) => {
                if let Some(hook) = &self.on_success {
                    hook(output);
                }
            }
            Err(SyncError::Unauthorized) => {}
            Err(err) => {
                if let Some(hook) = &self.on_error {
                    hook(err);
                }
            }
        }
        result
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn is_error(&self) -> bool {
        self.lock().last_error.is_some()
    }

    pub fn error(&self) -> Option<SyncError> {
        self.lock().last_error.clone()
    }

    pub fn reset(&self) {
        self.lock().last_error = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MutationStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Request pipeline.
//!
//! Every network call goes through [`RequestPipeline::execute`]: attach the
//! current bearer token, bound the call with a timeout, unwrap the envelope,
//! classify failures, and react to a 401 by tearing the session down once
//! and scheduling the sign-in redirect.

use crate::envelope::{self, Payload};
use crate::navigation::{schedule_sign_in_redirect, Navigator, RedirectPolicy};
use crate::session::{Credential, SessionState};
use crate::transport::{ApiRequest, Transport, TransportError};
use hearken_cache::QueryCache;
use hearken_core::{SyncError, SyncResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    session: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
    redirect: RedirectPolicy,
    timeout: Duration,
    /// Cleared on teardown; the cache never outlives the session it was
    /// filled under.
    cache: Option<QueryCache>,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("session", &self.session)
            .field("redirect", &self.redirect)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
        redirect: RedirectPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            navigator,
            redirect,
            timeout,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, request: ApiRequest) -> SyncResult<Payload> {
        let credential = if request.uses_session {
            self.session.credential()
        } else {
            Credential {
                token: None,
                epoch: self.session.epoch(),
            }
        };
        let started = Instant::now();
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            authenticated = credential.token.is_some(),
            "dispatching request"
        );

        let sent = tokio::time::timeout(
            self.timeout,
            self.transport.send(&request, credential.token.as_deref()),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let err = self.transport_failure(err);
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    elapsed_ms,
                    error = %err,
                    "request failed without a response"
                );
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    elapsed_ms,
                    "request timed out"
                );
                return Err(self.timeout_error());
            }
        };

        tracing::info!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            elapsed_ms,
            "request completed"
        );

        if response.status == 401 {
            if !request.uses_session {
                return Err(envelope::classify_rejection(&response));
            }
            self.handle_unauthorized(credential.epoch);
            return Err(SyncError::Unauthorized);
        }
        envelope::into_result(response)
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> SyncResult<T> {
        self.execute(request).await?.decode()
    }

    fn transport_failure(&self, err: TransportError) -> SyncError {
        match err {
            TransportError::NoResponse(reason) => SyncError::NetworkUnreachable { reason },
            TransportError::Timeout => self.timeout_error(),
            TransportError::Other(reason) => SyncError::Unknown(reason),
        }
    }

    fn timeout_error(&self) -> SyncError {
        SyncError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    fn handle_unauthorized(&self, epoch: u64) {
        if !self.session.teardown_if_current(epoch) {
            tracing::debug!(epoch, "session already torn down");
            return;
        }
        tracing::warn!(epoch, "session rejected by server, signing out");
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        schedule_sign_in_redirect(&self.redirect, Arc::clone(&self.navigator));
    }
}

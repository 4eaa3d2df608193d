//! Scripted transport and recording navigator for client tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hearken_client::{
    ApiRequest, ClientOptions, FeedbackClient, MemorySessionStore, Method, Navigator,
    RawResponse, RedirectPolicy, Session, SessionState, Transport, TransportError,
};
use hearken_core::{EntityIdType, User, UserId, UserRole};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

pub const SIGN_IN: &str = "/sign-in";
pub const TOKEN: &str = "token-3f9a";

#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(RawResponse),
    Fail(TransportError),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: ApiRequest,
    pub bearer: Option<String>,
}

/// Answers by (method, path); anything unscripted gets the fallback.
#[derive(Debug)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), Scripted>>,
    fallback: Mutex<Scripted>,
    log: Mutex<Vec<Recorded>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            fallback: Mutex::new(Scripted::Respond(RawResponse::json(
                404,
                &json!({ "message": "Not found" }),
            ))),
            log: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn route(&self, method: Method, path: impl Into<String>, answer: Scripted) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((method, path.into()), answer);
    }

    /// Answer with `data` wrapped in the success envelope.
    pub fn ok(&self, method: Method, path: impl Into<String>, data: impl Serialize) {
        let body = json!({
            "data": serde_json::to_value(data).unwrap(),
            "message": "OK",
            "success": true,
        });
        self.route(method, path, Scripted::Respond(RawResponse::json(200, &body)));
    }

    pub fn status(&self, method: Method, path: impl Into<String>, status: u16, body: Value) {
        self.route(method, path, Scripted::Respond(RawResponse::json(status, &body)));
    }

    pub fn fallback(&self, answer: Scripted) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = answer;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.request.method == method && r.request.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<RawResponse, TransportError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Recorded {
                request: request.clone(),
                bearer: bearer.map(str::to_string),
            });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let answer = self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(request.method, request.path.clone()))
            .cloned()
            .unwrap_or_else(|| {
                self.fallback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            });
        match answer {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(err) => Err(err),
        }
    }
}

/// Navigator that remembers where it was sent.
#[derive(Debug)]
pub struct RecordingNavigator {
    location: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(location: &str) -> Self {
        Self {
            location: Mutex::new(location.to_string()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn move_to(&self, location: &str) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location.to_string();
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, target: &str) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());
        self.move_to(target);
    }
}

pub fn admin() -> User {
    User {
        id: UserId::new(Uuid::from_u128(42)),
        email: "dana@example.edu".to_string(),
        name: "Dana Admin".to_string(),
        role: UserRole::Admin,
        department_id: None,
    }
}

pub struct Harness {
    pub client: FeedbackClient,
    pub transport: Arc<ScriptedTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub session: Arc<SessionState>,
}

pub fn options(timeout: Duration, redirect_delay: Duration) -> ClientOptions {
    ClientOptions {
        timeout,
        redirect: RedirectPolicy::new(SIGN_IN, redirect_delay),
        ..ClientOptions::default()
    }
}

/// A client signed in as [`admin`], sitting at `location`.
pub fn signed_in(transport: ScriptedTransport, location: &str) -> Harness {
    let options = options(Duration::from_secs(2), Duration::from_millis(10));
    let harness = signed_out(transport, location, options);
    harness
        .session
        .sign_in(Session::new(TOKEN, admin()))
        .unwrap();
    harness
}

pub fn signed_out(
    transport: ScriptedTransport,
    location: &str,
    options: ClientOptions,
) -> Harness {
    let transport = Arc::new(transport);
    let navigator = Arc::new(RecordingNavigator::at(location));
    let session = Arc::new(SessionState::new(Arc::new(MemorySessionStore::new())));
    let client = FeedbackClient::new(
        transport.clone(),
        Arc::clone(&session),
        navigator.clone(),
        options,
    );
    Harness {
        client,
        transport,
        navigator,
        session,
    }
}

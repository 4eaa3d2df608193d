//! Hearken client.
//!
//! The network-facing half of the synchronization layer: configuration,
//! session state, the request pipeline with its envelope handling, the
//! endpoint catalogue, and the [`FeedbackClient`] facade that ties guards,
//! requests, and cache invalidation together.

pub mod api;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod navigation;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use api::{ApiFetcher, CsvImportSummary, SignInRequest, SignInResponse};
pub use client::{ClientOptions, FeedbackClient};
pub use config::{CacheSettings, ClientConfig, ConfigError, TelemetryConfig};
pub use envelope::Payload;
pub use error::ClientError;
pub use navigation::{schedule_sign_in_redirect, Navigator, RedirectPolicy};
pub use pipeline::RequestPipeline;
pub use session::{
    Credential, FileSessionStore, MemorySessionStore, Session, SessionState, SessionStore,
    SessionStoreError,
};
pub use state::{MutationHandle, QueryState};
pub use telemetry::init_tracing;
pub use transport::{
    ApiRequest, Method, MultipartFile, RawResponse, RequestBody, ReqwestTransport, Transport,
    TransportError,
};

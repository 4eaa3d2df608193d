//! The client facade: guarded mutations and cached queries.
//!
//! Every mutation follows the same path. The workflow guard runs first and
//! a rejection never reaches the network. The request goes through the
//! pipeline, and only a successful response is handed to the invalidation
//! coordinator. A failed mutation leaves the cache exactly as it was.

use crate::api::{self, ApiFetcher, CsvImportSummary, SignInRequest, SignInResponse};
use crate::config::ClientConfig;
use crate::envelope::Payload;
use crate::error::ClientError;
use crate::navigation::{Navigator, RedirectPolicy};
use crate::pipeline::RequestPipeline;
use crate::session::{FileSessionStore, Session, SessionState, SessionStoreError};
use crate::state::{MutationHandle, QueryState};
use crate::transport::{ApiRequest, ReqwestTransport, Transport};
use hearken_cache::{
    CacheConfig, CacheKey, DirectoryKind, EntryStatus, InvalidationCoordinator, MutationKind,
    QueryCache, Resource,
};
use hearken_core::workflow::{
    check_analysis_ready, check_close_inquiry, check_edit_inquiry, check_input_body,
    check_reply_body, check_send_inquiry, check_submit_response, check_topic_mutable,
};
use hearken_core::{
    DirectoryFilters, EntityIdType, GuardRejection, Input, InputFilters, InputId, InputStats,
    InputStatus, InputUpdate, Inquiry, InquiryDraft, InquiryFilters, InquiryId, NewInput,
    NewReply, Page, Reply, RevealLedger, RevealReservation, RevealResponse, RevealState,
    RevealsInFlight, StatusLedger,
    SummaryGenerations, SyncError, SyncResult, Timestamp, Topic, TopicFilters, TopicId,
    TopicStatusChange, TopicUpdate, User,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Knobs for assembling a client by hand.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub redirect: RedirectPolicy,
    pub cache: CacheConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            redirect: RedirectPolicy::new("/sign-in", Duration::from_millis(1500)),
            cache: CacheConfig::default(),
        }
    }
}

struct ClientInner {
    pipeline: Arc<RequestPipeline>,
    fetcher: Arc<ApiFetcher>,
    coordinator: InvalidationCoordinator,
    session: Arc<SessionState>,
    summaries: SummaryGenerations,
    statuses: Mutex<StatusLedger>,
    reveals: Mutex<RevealLedger>,
    pending_reveals: RevealsInFlight,
}

/// Shared handle to the synchronization layer. Cloning is cheap.
#[derive(Clone)]
pub struct FeedbackClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for FeedbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackClient")
            .field("pipeline", &self.inner.pipeline)
            .field("cache", self.inner.coordinator.cache())
            .finish()
    }
}

impl FeedbackClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
        options: ClientOptions,
    ) -> Self {
        let cache = QueryCache::new(options.cache);
        let pipeline = Arc::new(
            RequestPipeline::new(
                transport,
                Arc::clone(&session),
                navigator,
                options.redirect,
                options.timeout,
            )
            .with_cache(cache.clone()),
        );
        Self {
            inner: Arc::new(ClientInner {
                fetcher: Arc::new(ApiFetcher::new(Arc::clone(&pipeline))),
                pipeline,
                coordinator: InvalidationCoordinator::new(cache),
                session,
                summaries: SummaryGenerations::new(),
                statuses: Mutex::new(StatusLedger::new()),
                reveals: Mutex::new(RevealLedger::new()),
                pending_reveals: RevealsInFlight::new(),
            }),
        }
    }

    /// Build from validated configuration, restoring the durable session.
    pub fn from_config(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.api_base_url, config.request_timeout())?;
        let store = Arc::new(FileSessionStore::new(config.session_path.clone()));
        let session = Arc::new(SessionState::restore(store)?);
        let options = ClientOptions {
            timeout: config.request_timeout(),
            redirect: RedirectPolicy::new(config.sign_in_path.clone(), config.redirect_delay()),
            cache: config.cache_config()?,
        };
        Ok(Self::new(Arc::new(transport), session, navigator, options))
    }

    pub fn cache(&self) -> &QueryCache {
        self.inner.coordinator.cache()
    }

    pub fn coordinator(&self) -> &InvalidationCoordinator {
        &self.inner.coordinator
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.inner.pipeline
    }

    pub fn summaries(&self) -> &SummaryGenerations {
        &self.inner.summaries
    }

    /// Bind an operation to a [`MutationHandle`].
    pub fn mutation<I, O, F, Fut>(&self, run: F) -> MutationHandle<I, O>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(FeedbackClient, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<O>> + Send + 'static,
    {
        let client = self.clone();
        MutationHandle::new(move |input| run(client.clone(), input))
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    pub async fn sign_in(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> SyncResult<User> {
        let request = api::sign_in(&SignInRequest {
            email: email.into(),
            password: password.into(),
        })?;
        let response: SignInResponse = self.inner.pipeline.execute_json(request).await?;
        let user = response.user.clone();

        self.reset_local_state();
        let epoch = self
            .inner
            .session
            .sign_in(Session::new(response.token, response.user))
            .map_err(|err| SyncError::Unknown(format!("failed to persist session: {}", err)))?;
        tracing::info!(user_id = %user.id, epoch, "signed in");
        Ok(user)
    }

    pub fn sign_out(&self) -> Result<(), SessionStoreError> {
        self.reset_local_state();
        tracing::info!("signed out");
        self.inner.session.sign_out()
    }

    fn reset_local_state(&self) {
        self.cache().clear();
        *lock(&self.inner.statuses) = StatusLedger::new();
        *lock(&self.inner.reveals) = RevealLedger::new();
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Read through the cache, fetching or revalidating as needed.
    pub async fn query<T: DeserializeOwned>(&self, key: &CacheKey) -> QueryState<T> {
        let read = self
            .cache()
            .get(key, Arc::clone(&self.inner.fetcher))
            .await
            .and_then(|read| read.decode::<T>());
        match read {
            Ok(read) => QueryState::from_read(read, self.cache().is_fetching(key)),
            Err(err) => QueryState::from_error(err),
        }
    }

    /// Current snapshot without waiting on the network.
    pub fn peek<T: DeserializeOwned>(&self, key: &CacheKey) -> QueryState<T> {
        let cache = self.cache();
        let is_fetching = cache.is_fetching(key);
        let last_error = match cache.status(key) {
            Some(EntryStatus::Error) => cache.entry(key).and_then(|entry| entry.last_error),
            _ => None,
        };

        let mut state = match cache.read(key) {
            Some(read) => match read.decode::<T>() {
                Ok(read) => QueryState::from_read(read, is_fetching),
                Err(err) => return QueryState::from_error(err),
            },
            None => QueryState {
                is_loading: is_fetching,
                is_fetching,
                ..QueryState::idle()
            },
        };
        if let Some(err) = last_error {
            state.is_error = true;
            state.error = Some(err);
        }
        state
    }

    pub fn mount(&self, key: &CacheKey) {
        self.cache().mount(key);
    }

    pub fn unmount(&self, key: &CacheKey) {
        self.cache().unmount(key);
    }

    pub async fn inputs(&self, filters: &InputFilters) -> QueryState<Page<Input>> {
        let state = self
            .query::<Page<Input>>(&CacheKey::list(Resource::InputsList, filters))
            .await;
        self.observe_inputs(state.data().map(|page| page.items.as_slice()));
        state
    }

    pub async fn my_inputs(&self, filters: &InputFilters) -> QueryState<Page<Input>> {
        let state = self
            .query::<Page<Input>>(&CacheKey::list(Resource::MyInputs, filters))
            .await;
        self.observe_inputs(state.data().map(|page| page.items.as_slice()));
        state
    }

    pub async fn input(&self, id: InputId) -> QueryState<Input> {
        let state = self
            .query::<Input>(&CacheKey::instance(Resource::InputDetail, id))
            .await;
        self.observe_inputs(state.data().map(std::slice::from_ref));
        state
    }

    pub async fn input_replies(&self, id: InputId) -> QueryState<Vec<Reply>> {
        self.query(&CacheKey::instance(Resource::InputReplies, id)).await
    }

    pub async fn input_stats(&self) -> QueryState<InputStats> {
        self.query(&CacheKey::bare(Resource::InputStats)).await
    }

    pub async fn inquiries(&self, filters: &InquiryFilters) -> QueryState<Page<Inquiry>> {
        self.query(&CacheKey::list(Resource::InquiriesList, filters)).await
    }

    pub async fn inquiry(&self, id: InquiryId) -> QueryState<Inquiry> {
        self.query(&CacheKey::instance(Resource::InquiryDetail, id)).await
    }

    pub async fn topics(&self, filters: &TopicFilters) -> QueryState<Page<Topic>> {
        self.query(&CacheKey::list(Resource::TopicsList, filters)).await
    }

    pub async fn topic(&self, id: TopicId) -> QueryState<Topic> {
        self.query(&CacheKey::instance(Resource::TopicDetail, id)).await
    }

    pub async fn directory<T: DeserializeOwned>(
        &self,
        kind: DirectoryKind,
        filters: &DirectoryFilters,
    ) -> QueryState<Page<T>> {
        self.query(&CacheKey::list(kind.list_resource(), filters)).await
    }

    pub async fn directory_entry<T: DeserializeOwned>(
        &self,
        kind: DirectoryKind,
        id: impl EntityIdType,
    ) -> QueryState<T> {
        self.query(&CacheKey::instance(kind.detail_resource(), id)).await
    }

    /// Last observed status of an input, never older than what was seen.
    pub fn effective_status(&self, id: InputId) -> Option<InputStatus> {
        lock(&self.inner.statuses).effective(id)
    }

    /// Reveal state of `input` after folding in this client's own requests.
    pub fn effective_reveal_state(&self, input: &Input) -> RevealState {
        lock(&self.inner.reveals).effective_state(input)
    }

    fn observe_inputs(&self, inputs: Option<&[Input]>) {
        if let Some(inputs) = inputs {
            let mut ledger = lock(&self.inner.statuses);
            for input in inputs {
                ledger.observe_input(input);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------------

    /// Submit feedback, optionally as a response to `inquiry`.
    pub async fn submit_input(
        &self,
        mut draft: NewInput,
        inquiry: Option<&Inquiry>,
        now: Timestamp,
    ) -> SyncResult<Input> {
        guard("submit_input", check_input_body(&draft.body))?;
        if let Some(inquiry) = inquiry {
            guard("submit_input", check_submit_response(inquiry, now))?;
            draft.inquiry_id = Some(inquiry.id);
        }
        let created: Input = self
            .run_created(api::submit_input(&draft)?, |id| MutationKind::InputSubmitted {
                id: id.map(InputId::new),
            })
            .await?;
        lock(&self.inner.statuses).observe_input(&created);
        Ok(created)
    }

    pub async fn update_input(&self, id: InputId, update: InputUpdate) -> SyncResult<Input> {
        if let Some(body) = &update.body {
            guard("update_input", check_input_body(body))?;
        }
        self.run(
            api::update_input(id, &update)?,
            MutationKind::InputUpdated { id },
        )
        .await?
        .decode()
    }

    pub async fn delete_input(&self, id: InputId) -> SyncResult<()> {
        self.run(api::delete_input(id), MutationKind::InputDeleted { id })
            .await?;
        lock(&self.inner.statuses).forget(id);
        Ok(())
    }

    /// Admin-driven processing transition.
    pub async fn set_input_status(&self, id: InputId, status: InputStatus) -> SyncResult<()> {
        self.run(
            api::set_input_status(id, status),
            MutationKind::InputStatusChanged { id },
        )
        .await?;
        lock(&self.inner.statuses).observe(id, status);
        Ok(())
    }

    /// Link an analysed input to a topic.
    pub async fn link_input_to_topic(&self, input: &Input, topic: &Topic) -> SyncResult<()> {
        guard("link_input_to_topic", check_topic_mutable(topic))?;
        let status = lock(&self.inner.statuses).observe_input(input);
        guard("link_input_to_topic", check_analysis_ready(status))?;
        self.run(
            api::link_input_to_topic(input.id, topic.id),
            MutationKind::InputLinkedToTopic {
                input_id: input.id,
                topic_id: topic.id,
            },
        )
        .await?;
        Ok(())
    }

    pub async fn request_reveal(&self, input: &Input) -> SyncResult<()> {
        let _reservation =
            self.reserve_reveal("request_reveal", input, RevealLedger::check_request)?;
        self.run(
            api::request_reveal(input.id),
            MutationKind::RevealRequested { id: input.id },
        )
        .await?;
        lock(&self.inner.reveals).record(input.id, RevealState::Pending);
        Ok(())
    }

    pub async fn respond_to_reveal(&self, input: &Input, approve: bool) -> SyncResult<()> {
        let _reservation =
            self.reserve_reveal("respond_to_reveal", input, RevealLedger::check_respond)?;
        self.run(
            api::respond_to_reveal(input.id, &RevealResponse { approve })?,
            MutationKind::RevealResponded { id: input.id },
        )
        .await?;
        let state = if approve {
            RevealState::Approved
        } else {
            RevealState::Denied
        };
        lock(&self.inner.reveals).record(input.id, state);
        Ok(())
    }

    /// Hold the input for one reveal call, then check the ledger. The
    /// reservation outlives the ledger update, so a concurrent call either
    /// finds the input held or sees the recorded state.
    fn reserve_reveal(
        &self,
        action: &'static str,
        input: &Input,
        check: fn(&RevealLedger, &Input) -> Result<(), GuardRejection>,
    ) -> SyncResult<RevealReservation> {
        let reservation = guard(action, self.inner.pending_reveals.begin(input.id))?;
        guard(action, check(&*lock(&self.inner.reveals), input))?;
        Ok(reservation)
    }

    pub async fn create_reply(
        &self,
        input_id: InputId,
        body: impl Into<String>,
    ) -> SyncResult<Reply> {
        let reply = NewReply { body: body.into() };
        guard("create_reply", check_reply_body(&reply.body))?;
        self.run(
            api::create_reply(input_id, &reply)?,
            MutationKind::ReplyCreated { input_id },
        )
        .await?
        .decode()
    }

    /// Forward a CSV file for bulk import. The bytes are not parsed here.
    pub async fn import_inputs_csv(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> SyncResult<CsvImportSummary> {
        if bytes.is_empty() {
            guard("import_inputs_csv", Err(GuardRejection::EmptyField { field: "File" }))?;
        }
        self.run(
            api::import_inputs_csv(file_name, bytes),
            MutationKind::CsvImported,
        )
        .await?
        .decode()
    }

    // ------------------------------------------------------------------------
    // Inquiries
    // ------------------------------------------------------------------------

    pub async fn create_inquiry(&self, draft: InquiryDraft) -> SyncResult<Inquiry> {
        if draft.title.trim().is_empty() {
            guard("create_inquiry", Err(GuardRejection::EmptyField { field: "Title" }))?;
        }
        self.run_created(api::create_inquiry(&draft)?, |id| {
            MutationKind::InquiryCreated {
                id: id.map(InquiryId::new),
            }
        })
        .await
    }

    pub async fn update_inquiry(
        &self,
        inquiry: &Inquiry,
        draft: InquiryDraft,
    ) -> SyncResult<Inquiry> {
        guard("update_inquiry", check_edit_inquiry(inquiry))?;
        self.run(
            api::update_inquiry(inquiry.id, &draft)?,
            MutationKind::InquiryUpdated { id: inquiry.id },
        )
        .await?
        .decode()
    }

    pub async fn send_inquiry(&self, inquiry: &Inquiry) -> SyncResult<()> {
        guard("send_inquiry", check_send_inquiry(inquiry))?;
        self.run(
            api::send_inquiry(inquiry.id),
            MutationKind::InquirySent { id: inquiry.id },
        )
        .await?;
        Ok(())
    }

    pub async fn close_inquiry(&self, inquiry: &Inquiry) -> SyncResult<()> {
        guard("close_inquiry", check_close_inquiry(inquiry))?;
        self.run(
            api::close_inquiry(inquiry.id),
            MutationKind::InquiryClosed { id: inquiry.id },
        )
        .await?;
        Ok(())
    }

    pub async fn delete_inquiry(&self, id: InquiryId) -> SyncResult<()> {
        self.run(api::delete_inquiry(id), MutationKind::InquiryDeleted { id })
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------------

    pub async fn update_topic(&self, topic: &Topic, update: TopicUpdate) -> SyncResult<Topic> {
        guard("update_topic", check_topic_mutable(topic))?;
        self.run(
            api::update_topic(topic.id, &update)?,
            MutationKind::TopicUpdated { id: topic.id },
        )
        .await?
        .decode()
    }

    pub async fn change_topic_status(
        &self,
        topic: &Topic,
        change: TopicStatusChange,
    ) -> SyncResult<()> {
        guard("change_topic_status", check_topic_mutable(topic))?;
        self.run(
            api::change_topic_status(topic.id, &change)?,
            MutationKind::TopicStatusChanged { id: topic.id },
        )
        .await?;
        Ok(())
    }

    pub async fn archive_topic(&self, topic: &Topic) -> SyncResult<()> {
        guard("archive_topic", check_topic_mutable(topic))?;
        self.run(
            api::archive_topic(topic.id),
            MutationKind::TopicArchived { id: topic.id },
        )
        .await?;
        Ok(())
    }

    /// Regenerate a topic's AI summary. Refused while one is already running
    /// for the same topic.
    pub async fn regenerate_summary(&self, topic_id: TopicId) -> SyncResult<()> {
        let _generation = guard("regenerate_summary", self.inner.summaries.begin(topic_id))?;
        self.run(
            api::regenerate_summary(topic_id),
            MutationKind::TopicSummaryRegenerated { id: topic_id },
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------------

    pub async fn create_directory<D, T>(&self, kind: DirectoryKind, draft: &D) -> SyncResult<T>
    where
        D: Serialize,
        T: DeserializeOwned,
    {
        self.run_created(api::create_directory(kind, draft)?, |id| {
            MutationKind::DirectoryCreated { kind, id }
        })
        .await
    }

    pub async fn update_directory<D, T>(
        &self,
        kind: DirectoryKind,
        id: impl EntityIdType,
        draft: &D,
    ) -> SyncResult<T>
    where
        D: Serialize,
        T: DeserializeOwned,
    {
        self.run(
            api::update_directory(kind, id, draft)?,
            MutationKind::DirectoryUpdated {
                kind,
                id: id.as_uuid(),
            },
        )
        .await?
        .decode()
    }

    pub async fn delete_directory(
        &self,
        kind: DirectoryKind,
        id: impl EntityIdType,
    ) -> SyncResult<()> {
        self.run(
            api::delete_directory(kind, id),
            MutationKind::DirectoryDeleted {
                kind,
                id: id.as_uuid(),
            },
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------------

    /// Dispatch, then invalidate on success only.
    async fn run(&self, request: ApiRequest, mutation: MutationKind) -> SyncResult<Payload> {
        let result = self.inner.pipeline.execute(request).await;
        if let Err(err) = &result {
            tracing::debug!(mutation = %mutation, error = %err, "mutation failed, cache untouched");
        }
        self.inner.coordinator.settle(&mutation, result)
    }

    /// Like [`Self::run`], for creations whose invalidation needs the id the
    /// server assigned.
    async fn run_created<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        mutation: impl FnOnce(Option<Uuid>) -> MutationKind,
    ) -> SyncResult<T> {
        let value = self.inner.pipeline.execute(request).await?.into_json();
        let id = value.as_ref().ok().and_then(created_id);
        self.inner.coordinator.apply(&mutation(id));
        Ok(serde_json::from_value(value?)?)
    }
}

fn created_id(value: &Value) -> Option<Uuid> {
    value
        .get("id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn guard<T>(action: &'static str, check: Result<T, GuardRejection>) -> SyncResult<T> {
    check.map_err(|rejection| {
        tracing::info!(action, reason = %rejection, "blocked by workflow guard");
        SyncError::WorkflowGuardRejected(rejection)
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

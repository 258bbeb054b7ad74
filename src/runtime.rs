//! Wires the task core from configuration.

use crate::config::{ConfigError, TaskLaneConfig};
use crate::live::{LiveEventBridge, LiveNotifier};
use crate::task::{
    adapters::{
        input_capture::{ConfiguredInputCaptureHook, HttpInputCaptureHook},
        memory::InMemoryTaskRepository,
        postgres::{PostgresTaskRepository, TaskPgPool},
    },
    events::TaskEventChannel,
    ports::TaskRepository,
    services::{TaskLifecycleService, TaskSelectionService},
};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Errors raised while assembling a [`TaskRuntime`].
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Construction was attempted outside a tokio runtime.
    #[error("task runtime must be built inside a tokio runtime")]
    NoAsyncRuntime,
    /// `[database] url` is required for the `PostgreSQL` store.
    #[error("database.url is not configured")]
    MissingDatabaseUrl,
    /// The connection pool could not be created.
    #[error("failed to build database pool: {0}")]
    Pool(Arc<dyn std::error::Error + Send + Sync>),
}

/// Lifecycle service as wired by [`TaskRuntime`].
pub type RuntimeLifecycleService<R> =
    TaskLifecycleService<R, ConfiguredInputCaptureHook, DefaultClock>;

/// Selection service as wired by [`TaskRuntime`].
pub type RuntimeSelectionService<R> = TaskSelectionService<R, DefaultClock>;

/// Assembled task core: store, services, event channel and live fan-out.
///
/// The live event bridge runs until [`TaskRuntime::shutdown`] or until every
/// handle to the event channel is dropped.
pub struct TaskRuntime<R>
where
    R: TaskRepository + 'static,
{
    repository: Arc<R>,
    events: TaskEventChannel,
    notifier: LiveNotifier,
    lifecycle: RuntimeLifecycleService<R>,
    selection: RuntimeSelectionService<R>,
    bridge: JoinHandle<()>,
}

impl TaskRuntime<InMemoryTaskRepository> {
    /// Builds a runtime over the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] for invalid configuration and
    /// [`RuntimeError::NoAsyncRuntime`] outside tokio.
    pub fn in_memory(config: &TaskLaneConfig) -> Result<Self, RuntimeError> {
        Self::new(config, InMemoryTaskRepository::new())
    }
}

impl TaskRuntime<PostgresTaskRepository> {
    /// Builds a runtime over `PostgreSQL` using `[database]`.
    ///
    /// Pool construction opens connections and blocks until they succeed or
    /// time out.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingDatabaseUrl`] when no URL is set and
    /// [`RuntimeError::Pool`] when connecting fails.
    pub fn postgres(config: &TaskLaneConfig) -> Result<Self, RuntimeError> {
        let url = config
            .database
            .url
            .as_deref()
            .ok_or(RuntimeError::MissingDatabaseUrl)?;
        let manager = ConnectionManager::<PgConnection>::new(url);
        let pool: TaskPgPool = Pool::builder()
            .max_size(config.database.pool_size)
            .build(manager)
            .map_err(|err| RuntimeError::Pool(Arc::new(err)))?;
        Self::new(config, PostgresTaskRepository::new(pool))
    }
}

impl<R> TaskRuntime<R>
where
    R: TaskRepository + 'static,
{
    /// Builds a runtime over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] for invalid configuration and
    /// [`RuntimeError::NoAsyncRuntime`] outside tokio.
    pub fn new(config: &TaskLaneConfig, store: R) -> Result<Self, RuntimeError> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime)?;

        let repository = Arc::new(store);
        let clock = Arc::new(DefaultClock);
        let events = TaskEventChannel::new(config.events.capacity);
        let notifier = LiveNotifier::new(config.live.client_queue_capacity);
        let bridge = handle.spawn(LiveEventBridge::new(events.subscribe(), notifier.clone()).run());

        let hook = match config.input_capture.base_url.as_deref() {
            Some(base_url) => ConfiguredInputCaptureHook::Http(HttpInputCaptureHook::new(
                base_url,
                config.input_capture.timeout(),
            )),
            None => ConfiguredInputCaptureHook::Disabled,
        };

        let lifecycle = TaskLifecycleService::new(
            Arc::clone(&repository),
            Arc::new(hook),
            events.clone(),
            Arc::clone(&clock),
        )
        .with_settings(config.lifecycle_settings());
        let selection = TaskSelectionService::new(Arc::clone(&repository), clock);

        tracing::info!(
            event_capacity = config.events.capacity,
            client_queue_capacity = config.live.client_queue_capacity,
            input_capture = config.input_capture.base_url.is_some(),
            "task runtime started"
        );

        Ok(Self {
            repository,
            events,
            notifier,
            lifecycle,
            selection,
            bridge,
        })
    }

    /// Lifecycle controller.
    #[must_use]
    pub const fn lifecycle(&self) -> &RuntimeLifecycleService<R> {
        &self.lifecycle
    }

    /// Next-task selector and scheduled-task promoter.
    #[must_use]
    pub const fn selection(&self) -> &RuntimeSelectionService<R> {
        &self.selection
    }

    /// Live notifier that transports attach clients to.
    #[must_use]
    pub const fn notifier(&self) -> &LiveNotifier {
        &self.notifier
    }

    /// Domain event channel for in-process subscribers.
    #[must_use]
    pub const fn events(&self) -> &TaskEventChannel {
        &self.events
    }

    /// Underlying task store.
    #[must_use]
    pub const fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Stops the live event bridge.
    pub fn shutdown(self) {
        self.bridge.abort();
        tracing::info!("task runtime stopped");
    }
}

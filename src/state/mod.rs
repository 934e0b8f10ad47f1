/// Offline intent queue.
pub mod outbox;
/// Runtime session model and mutation rules.
pub mod session;
mod sse;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
    services::generation_service::GenerationClient,
    state::{outbox::Outbox, session::GameSession},
};

pub use self::sse::SessionHub;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

const SESSION_HUB_CAPACITY: usize = 16;

/// Central application state storing the store handle, per-session broadcast
/// hubs, the offline outbox, and the last known snapshot per session.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    hub: SessionHub,
    outbox: Outbox,
    snapshots: DashMap<String, GameSession>,
    generation: Option<GenerationClient>,
    degraded: watch::Sender<bool>,
    draining: AtomicBool,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, generation: Option<GenerationClient>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let outbox = Outbox::new(config.outbox_capacity);
        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            hub: SessionHub::new(SESSION_HUB_CAPACITY),
            outbox,
            snapshots: DashMap::new(),
            generation,
            degraded: degraded_tx,
            draining: AtomicBool::new(false),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the session store or fail with a degraded-mode error.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }
        let _ = self.degraded.send(value);
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hubs used for the per-session snapshot streams.
    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    /// Offline queue of mutating operations awaiting replay.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Generative text client, when one is configured.
    pub fn generation(&self) -> Option<&GenerationClient> {
        self.generation.as_ref()
    }

    /// Remember the latest authoritative snapshot for a session.
    pub fn remember_snapshot(&self, session: GameSession) {
        self.snapshots.insert(session.code.clone(), session);
    }

    /// Last known snapshot for a session, if one was observed.
    pub fn last_snapshot(&self, code: &str) -> Option<GameSession> {
        self.snapshots.get(code).map(|entry| entry.clone())
    }

    /// Drop the cached snapshot of a closed session.
    pub fn forget_snapshot(&self, code: &str) {
        self.snapshots.remove(code);
    }

    /// Flag toggled while the outbox is replaying after a reconnect.
    pub fn set_draining(&self, value: bool) {
        self.draining.store(value, Ordering::SeqCst);
    }

    /// Whether queued operations are currently being replayed.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

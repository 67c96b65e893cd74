//! Application state shared across handlers.

use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;

use portfolio_store::KvStore;

use crate::config::ServerConfig;
use crate::error::ApiResult;
use crate::notify::{Notifier, TelegramNotifier};
use crate::reload::ReloadRegistry;
use crate::router::Handler;

/// Application state shared across all handlers.
///
/// Cheap to clone; controllers receive it through [`AppState::bind`].
#[derive(Clone)]
pub struct AppState {
    /// Record store.
    store: Arc<KvStore>,
    /// Server configuration.
    config: Arc<ServerConfig>,
    /// Chat notifier, when credentials are configured.
    notifier: Option<Arc<dyn Notifier>>,
    /// Connected hot reload clients.
    reload: Arc<ReloadRegistry>,
}

impl AppState {
    /// Create new application state. A Telegram notifier is created when
    /// the configuration carries credentials.
    pub fn new(store: Arc<KvStore>, config: ServerConfig) -> Self {
        let notifier = config
            .telegram
            .clone()
            .map(|telegram| Arc::new(TelegramNotifier::new(telegram)) as Arc<dyn Notifier>);
        Self {
            store,
            config: Arc::new(config),
            notifier,
            reload: Arc::new(ReloadRegistry::new()),
        }
    }

    /// Replace the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Option<Arc<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Get a reference to the record store.
    pub fn store(&self) -> &KvStore {
        &self.store
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the notifier, if one is configured.
    pub fn notifier(&self) -> Option<&dyn Notifier> {
        self.notifier.as_deref()
    }

    /// Get a reference to the reload client registry.
    pub fn reload(&self) -> &Arc<ReloadRegistry> {
        &self.reload
    }

    /// Turn a controller function into a route handler bound to this state.
    pub fn bind<F, Fut>(&self, controller: F) -> impl Handler + use<F, Fut>
    where
        F: Fn(AppState, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        let state = self.clone();
        move |req: Request| controller(state.clone(), req)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("backend", &self.store.backend_kind())
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

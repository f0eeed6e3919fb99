//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::realtime::EventHub;
use crate::services::push::PushService;

/// Application state shared across all handlers.
///
/// Handlers receive this via `State`; nothing is looked up through ambient
/// globals. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    hub: EventHub,
    push: PushService,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let push = PushService::new(pool.clone(), config.vapid.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                hub: EventHub::new(),
                push,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.inner.hub
    }

    #[must_use]
    pub fn push(&self) -> &PushService {
        &self.inner.push
    }
}

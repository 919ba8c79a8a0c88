use std::sync::Arc;

use crate::config::Config;
use crate::traits::{Cache, Ledger, Responder, RouteManager, Wallet};
use storage::RecordStore;

/// Configuration and collaborators shared by every manager operation.
///
/// Wallet and record store are mandatory; the rest degrade gracefully when
/// absent (no auto-dispatch, no ledger resolution, no caching, no routing).
#[derive(Clone)]
pub struct ExchangeState {
    pub config: Config,
    pub wallet: Arc<dyn Wallet>,
    pub store: Arc<dyn RecordStore>,
    pub responder: Option<Arc<dyn Responder>>,
    pub ledger: Option<Arc<dyn Ledger>>,
    pub cache: Option<Arc<dyn Cache>>,
    pub route_manager: Option<Arc<dyn RouteManager>>,
}

impl ExchangeState {
    pub fn new(config: Config, wallet: Arc<dyn Wallet>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            wallet,
            store,
            responder: None,
            ledger: None,
            cache: None,
            route_manager: None,
        }
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_route_manager(mut self, route_manager: Arc<dyn RouteManager>) -> Self {
        self.route_manager = Some(route_manager);
        self
    }
}

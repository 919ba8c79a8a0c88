use std::sync::Arc;

use didexchange::cache::InMemoryCache;
use didexchange::config::Config;
use didexchange::manager::ExchangeManager;
use didexchange::state::ExchangeState;
use didexchange::testing::{MockLedger, MockResponder, MockRouteManager, MockWallet};
use serde::de::DeserializeOwned;
use storage::InMemoryStore;

/// One agent under test: a manager wired to in-memory collaborators.
pub struct TestAgent {
    pub manager: ExchangeManager,
    pub wallet: Arc<MockWallet>,
    pub store: Arc<InMemoryStore>,
    pub responder: Arc<MockResponder>,
    pub ledger: Arc<MockLedger>,
    pub route_manager: Arc<MockRouteManager>,
}

pub fn agent(config: Config) -> TestAgent {
    let wallet = Arc::new(MockWallet::new());
    let store = Arc::new(InMemoryStore::new());
    let responder = Arc::new(MockResponder::new());
    let ledger = Arc::new(MockLedger::new());
    let route_manager = Arc::new(MockRouteManager::new());

    let state = ExchangeState::new(config, wallet.clone(), store.clone())
        .with_responder(responder.clone())
        .with_cache(Arc::new(InMemoryCache::new()))
        .with_ledger(ledger.clone())
        .with_route_manager(route_manager.clone());

    TestAgent {
        manager: ExchangeManager::new(Arc::new(state)),
        wallet,
        store,
        responder,
        ledger,
        route_manager,
    }
}

/// The single message the agent dispatched since the last drain.
pub fn sent_message<T: DeserializeOwned>(responder: &MockResponder) -> T {
    let mut sent = responder.take_sent();
    assert_eq!(sent.len(), 1, "expected exactly one outbound message");
    serde_json::from_value(sent.remove(0).0).unwrap()
}

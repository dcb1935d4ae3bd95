use meridian_agent::Orchestrator;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One logical session behind one lock: a single writer at a time.
/// `inventory_revision` ticks on every store mutation via the store's
/// subscriber hook.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Orchestrator>>,
    pub inventory_revision: Arc<AtomicU64>,
}

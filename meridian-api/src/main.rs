use meridian_agent::llm::HttpChatModel;
use meridian_agent::policy::HttpPolicyIndex;
use meridian_agent::Orchestrator;
use meridian_api::{app, AppState};
use meridian_inventory::store::InventoryStore;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = meridian_shared::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Meridian API on port {}", config.server.port);

    let chat_model =
        HttpChatModel::new(&config.collaborators).expect("Failed to build chat model client");
    let policy_index =
        HttpPolicyIndex::new(&config.collaborators).expect("Failed to build policy client");

    let inventory_revision = Arc::new(AtomicU64::new(0));
    let mut store = InventoryStore::new();
    let revision = inventory_revision.clone();
    store.subscribe(move || {
        revision.fetch_add(1, Ordering::SeqCst);
    });

    let orchestrator = Orchestrator::new(
        store,
        Arc::new(chat_model),
        Arc::new(policy_index),
        config.business_rules.clone(),
    );

    let app_state = AppState {
        session: Arc::new(Mutex::new(orchestrator)),
        inventory_revision,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

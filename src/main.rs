mod room;
mod session;
mod shared;
mod websockets;

use axum::{
    routing::{get, post},
    Router,
};
use room::repository::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository};
use room::service::RoomService;
use shared::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use websockets::InMemoryConnectionRegistry;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collabroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting collaborative room server");

    // Room Store: Postgres when DATABASE_URL is set, in-memory otherwise
    let room_repository: Arc<dyn RoomRepository> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::PgPool::connect(&database_url)
                .await
                .expect("Failed to connect to database");
            info!("Using PostgreSQL room store");
            Arc::new(PostgresRoomRepository::new(pool))
        }
        Err(_) => {
            info!("DATABASE_URL not set, using in-memory room store");
            Arc::new(InMemoryRoomRepository::new())
        }
    };

    let room_service = Arc::new(RoomService::new(room_repository));
    let registry = Arc::new(InMemoryConnectionRegistry::new());
    let app_state = AppState::new(room_service, registry);

    let app = Router::new()
        .route("/", get(|| async { "Server is running..." }))
        .route("/api/rooms/create", post(room::create_room))
        .route("/api/rooms/join", post(room::join_room))
        .route("/api/rooms/created/:email", get(room::list_created_rooms))
        .route("/api/rooms/joined/:email", get(room::list_joined_rooms))
        .route("/ws", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        // The upstream client is served from a different origin
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind listener");
    info!("Server running on http://localhost:{}", port);
    axum::serve(listener, app).await.expect("Server error");
}

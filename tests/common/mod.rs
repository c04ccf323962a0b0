use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use fieldstock_api::{
    config::AppConfig,
    db::{establish_connection_with_config, run_migrations, DbConfig},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Harness wiring the full router to an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    #[allow(dead_code)]
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        run_migrations(&pool).await.expect("failed to run migrations");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let config = AppConfig {
            database_url: db_config.url,
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 30,
            db_idle_timeout_secs: 600,
            db_acquire_timeout_secs: 8,
        };

        let services = AppServices::new(db.clone(), event_sender.clone());
        let state = AppState {
            db,
            config,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", fieldstock_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

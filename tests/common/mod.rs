//! Common test utilities for E2E tests

use tempfile::TempDir;
use tokio::net::TcpListener;
use wardwatch::{AppState, config};

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Metrics are process-global; register them once across tests.
        static METRICS: std::sync::Once = std::sync::Once::new();
        METRICS.call_once(wardwatch::metrics::init_metrics);

        // Create temporary directory for test database and uploads
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let uploads_dir = temp_dir.path().join("uploads");

        // Create test configuration. The geocoder points at a closed
        // loopback port, so every lookup fails fast and falls back to
        // the sentinel address.
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            geocoder: config::GeocoderConfig {
                base_url: "http://127.0.0.1:9/".to_string(),
                timeout_seconds: 1,
            },
            push: config::PushConfig {
                timeout_seconds: 1,
                max_concurrent: 10,
            },
            uploads: config::UploadsConfig {
                dir: uploads_dir,
                max_photo_bytes: 5 * 1024 * 1024,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = wardwatch::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user directly through the API and return its id
    pub async fn create_user(&self, name: &str, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/users"))
            .json(&serde_json::json!({ "name": name, "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Register a fake dashboard client with the broadcaster and return
    /// its frame receiver
    pub async fn fake_ws_client(
        &self,
    ) -> tokio::sync::mpsc::UnboundedReceiver<axum::extract::ws::Message> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.state.broadcaster.on_connect(tx).await;
        rx
    }
}

/// Wait for a text frame to arrive on a fake client, with a timeout
pub async fn next_text_frame(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<axum::extract::ws::Message>,
) -> String {
    let message = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("expected a broadcast frame")
        .expect("broadcast channel closed");

    match message {
        axum::extract::ws::Message::Text(text) => text,
        other => panic!("unexpected frame: {:?}", other),
    }
}

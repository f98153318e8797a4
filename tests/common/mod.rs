//! Common test utilities for E2E tests

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use picturesque::config;
use picturesque::error::AppError;
use picturesque::geo::GeocodingGateway;
use picturesque::storage::{MediaGateway, UploadedBlob};
use picturesque::{AppState, build_router};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const BROOKLYN_BRIDGE: (f64, f64) = (40.7061, -73.9969);
pub const BROOKLYN_BRIDGE_ADDRESS: &str = "Brooklyn Bridge, New York, United States";

/// In-memory media gateway recording uploads and deletes
#[derive(Default)]
pub struct FakeMediaGateway {
    pub uploads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    /// When set, uploads fail as the media store would
    pub fail_uploads: AtomicBool,
}

#[async_trait]
impl MediaGateway for FakeMediaGateway {
    async fn upload(
        &self,
        _data: Vec<u8>,
        _content_type: &str,
        desired_id: &str,
    ) -> Result<UploadedBlob, AppError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::Storage("upload failed".to_string()));
        }
        self.uploads.lock().unwrap().push(desired_id.to_string());
        Ok(UploadedBlob {
            stored_id: desired_id.to_string(),
            secure_url: format!("https://media.test/photos/{desired_id}"),
        })
    }

    fn thumbnail_url(&self, stored_id: &str) -> String {
        format!("https://media.test/thumb/{stored_id}")
    }

    async fn delete(&self, stored_id: &str) -> Result<(), AppError> {
        self.deletes.lock().unwrap().push(stored_id.to_string());
        Ok(())
    }
}

/// Geocoder fake knowing exactly one place
#[derive(Default)]
pub struct FakeGeocoder {
    /// When set, every call fails as a transient outage
    pub unavailable: AtomicBool,
}

impl FakeGeocoder {
    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable(
                "Geocoder currently not available. Try later.".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GeocodingGateway for FakeGeocoder {
    async fn forward(&self, address: &str) -> Result<Option<(f64, f64)>, AppError> {
        self.check_available()?;
        if address.contains("Brooklyn Bridge") {
            Ok(Some(BROOKLYN_BRIDGE))
        } else {
            Ok(None)
        }
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>, AppError> {
        self.check_available()?;
        if (latitude - BROOKLYN_BRIDGE.0).abs() < 1e-6
            && (longitude - BROOKLYN_BRIDGE.1).abs() < 1e-6
        {
            Ok(Some(BROOKLYN_BRIDGE_ADDRESS.to_string()))
        } else {
            Ok(None)
        }
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub media: Arc<FakeMediaGateway>,
    pub geocoder: Arc<FakeGeocoder>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance with fake gateways
    pub async fn new() -> Self {
        // Temporary directory for the test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            storage: config::StorageConfig {
                media: config::MediaStorageConfig {
                    bucket: "test-media".to_string(),
                    public_url: "https://media.test".to_string(),
                    thumbnail_transform: "width=150,height=120,fit=crop".to_string(),
                },
            },
            cloudflare: config::CloudflareConfig {
                account_id: "test-account".to_string(),
                r2_access_key_id: "test-key".to_string(),
                r2_secret_access_key: "test-secret".to_string(),
            },
            geocoder: config::GeocoderConfig {
                base_url: "https://nominatim.test".to_string(),
                user_agent: "picturesque_api_tests".to_string(),
                timeout_seconds: 10,
            },
            auth: config::AuthConfig {
                token_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                access_token_ttl: 300,
                refresh_token_ttl: 2_592_000,
                revocation_ttl: 3600,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let media = Arc::new(FakeMediaGateway::default());
        let geocoder = Arc::new(FakeGeocoder::default());

        let state = AppState::with_gateways(config, media.clone(), geocoder.clone())
            .await
            .unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for the server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            media,
            geocoder,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register a user, returning the raw response
    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/register"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
                "confirm_password": password,
            }))
            .send()
            .await
            .unwrap()
    }

    /// Log a user in, returning (access_token, refresh_token)
    pub async fn login(&self, username: &str, password: &str) -> (String, String) {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "login failed for {username}");

        let body: serde_json::Value = response.json().await.unwrap();
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Register + login, returning an access token
    pub async fn create_user(&self, username: &str) -> String {
        let response = self.register(username, "sunshine42").await;
        assert_eq!(response.status(), 201, "registration failed for {username}");
        self.login(username, "sunshine42").await.0
    }

    /// Build a multipart form for post creation
    pub fn post_form(author: &str, title: &str, quote: &str) -> reqwest::multipart::Form {
        reqwest::multipart::Form::new()
            .text("author", author.to_string())
            .text("title", title.to_string())
            .text("quote", quote.to_string())
            .part(
                "photo",
                reqwest::multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
                    .file_name("photo.jpg"),
            )
    }

    /// Create a post, returning the raw response
    pub async fn create_post(
        &self,
        token: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Response {
        self.client
            .post(self.url("/posts"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// Create a post and return its JSON body
    pub async fn create_post_json(
        &self,
        token: &str,
        author: &str,
        title: &str,
        quote: &str,
    ) -> serde_json::Value {
        let response = self.create_post(token, Self::post_form(author, title, quote)).await;
        assert_eq!(response.status(), 201, "post creation failed");
        response.json().await.unwrap()
    }

    /// Add a post to the caller's collection
    pub async fn collect(&self, token: &str, post_id: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/collections/{post_id}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

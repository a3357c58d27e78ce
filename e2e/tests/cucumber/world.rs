use std::{collections::HashMap, sync::mpsc::channel};

use actix_web::dev::ServerHandle;
use billing_engine::{
    events::EventProducers,
    helpers::{sign_payload, SIGNATURE_HEADER},
    test_utils::{
        fake_processor::FakeProcessor,
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    traits::BillingDatabase,
    SqliteDatabase,
};
use billing_server::{
    auth::basic_auth_header,
    config::{ServerConfig, WebhookConfig},
    middleware::ADMIN_KEY_HEADER,
    server::create_server_instance,
};
use chrono::Utc;
use cucumber::World;
use log::*;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use vb_common::Secret;

pub const WEBHOOK_SECRET: &str = "whsec_e2e_tests_only";
pub const ADMIN_KEY: &str = "e2e_admin_key";
pub const VENDOR_PASSWORD: &str = "e2e vendor password";

#[derive(World)]
pub struct BillingWorld {
    pub config: ServerConfig,
    pub db: Option<SqliteDatabase>,
    pub processor: FakeProcessor,
    pub server_handle: Option<ServerHandle>,
    /// Client names to processor customer ids
    pub customers: HashMap<String, String>,
    pub response: Option<(StatusCode, String)>,
}

impl std::fmt::Debug for BillingWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BillingWorld({}:{}, {:?})", self.config.host, self.config.port, self.response)
    }
}

impl Default for BillingWorld {
    fn default() -> Self {
        let _ = env_logger::try_init().ok();
        let mut config = ServerConfig::new("127.0.0.1", 20000 + rand::random::<u16>() % 10_000);
        config.database_url = random_db_path();
        config.webhook = WebhookConfig::new(WEBHOOK_SECRET);
        config.admin_api_key = Secret::new(ADMIN_KEY.to_string());
        Self {
            config,
            db: None,
            processor: FakeProcessor::new(),
            server_handle: None,
            customers: HashMap::new(),
            response: None,
        }
    }
}

impl BillingWorld {
    pub async fn start_database(&mut self) {
        let url = self.config.database_url.clone();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("🌍️ Created database: {url}");
        self.db = Some(db);
    }

    pub fn database(&self) -> &SqliteDatabase {
        self.db.as_ref().expect("Database not started")
    }

    pub async fn start_server(&mut self) {
        let config = self.config.clone();
        let db = self.database().clone();
        let processor = self.processor.clone();
        info!("🌍️ Starting server on {}:{} using DB {}", config.host, config.port, db.url());
        let (tx, rx) = channel();
        tokio::spawn(async move {
            let srv = create_server_instance(config, db, processor, EventProducers::default())
                .expect("Error creating server instance");
            let _res = tx.send(srv.handle());
            match srv.await {
                Ok(_) => info!("🌍️ Server shut down"),
                Err(e) => warn!("🌍️ Server error: {e}"),
            }
        });
        let handle = rx.recv().expect("Server did not start");
        info!("🌍️ Server started");
        self.server_handle = Some(handle);
    }

    pub fn customer_id(&self, name: &str) -> String {
        self.customers.get(name).cloned().unwrap_or_else(|| panic!("{name} is not a known customer"))
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.request(Method::GET, path, |req| req).await
    }

    pub async fn request<F>(&self, method: Method, path: &str, req: F) -> (StatusCode, String)
    where F: FnOnce(RequestBuilder) -> RequestBuilder {
        let path = path.trim_start_matches('/');
        let url = format!("http://{}:{}/{path}", self.config.host, self.config.port);
        debug!("🌍️ Querying {url}");
        let client = Client::new();
        let request = req(client.request(method, url));
        let res = request.send().await.expect("Error getting response");
        let code = res.status();
        let body = res.text().await.expect("Error parsing response body");
        (code, body)
    }

    pub async fn as_admin(&self, method: Method, path: &str) -> (StatusCode, String) {
        self.request(method, path, |req| req.header(ADMIN_KEY_HEADER, ADMIN_KEY)).await
    }

    pub async fn as_vendor<F>(&self, vendor: &str, method: Method, path: &str, req: F) -> (StatusCode, String)
    where F: FnOnce(RequestBuilder) -> RequestBuilder {
        let auth = basic_auth_header(vendor, VENDOR_PASSWORD);
        self.request(method, path, |r| req(r.header("Authorization", auth))).await
    }

    /// Delivers an event the way the processor does, signed with the endpoint secret.
    pub async fn deliver(&self, body: String) -> (StatusCode, String) {
        let signature = sign_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp()).expect("Signing failed");
        self.request(Method::POST, "/stripe/webhook", |req| {
            req.header(SIGNATURE_HEADER, signature).header("Content-Type", "application/json").body(body)
        })
        .await
    }
}

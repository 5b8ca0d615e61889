//! Test helpers: a configured server home with partners and certificates on disk.
//!
//! Run from workspace root: `cargo test -p ferroas2-server`.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use ferroas2_core::ServerConfig;
use ferroas2_server::setup::{routes, services};
use ferroas2_server::AppState;
use ferroas2_worker::Scheduler;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tempfile::TempDir;

/// Local company served by the test app.
pub const LOCAL: &str = "partnerb";
/// Trading partner posting to it.
pub const REMOTE: &str = "acme";

pub struct TestApp {
    pub file_server: TestServer,
    pub mdn_server: TestServer,
    pub state: AppState,
    pub scheduler: Arc<Scheduler>,
    pub config: ServerConfig,
    /// Identity of the remote partner, for building signed requests.
    pub remote_cert: X509,
    pub remote_key: PKey<Private>,
    /// Certificate of the local company, for checking signed replies.
    pub local_cert: X509,
    _home: TempDir,
}

fn partners_json() -> String {
    format!(
        r#"{{
            "company": {{ "as2id": "{local}", "name": "Partner B", "email": "edi@{local}.example" }},
            "partners": [
                {{ "as2id": "{remote}", "name": "Acme", "email": "as2@{remote}.example" }}
            ]
        }}"#,
        local = LOCAL,
        remote = REMOTE
    )
}

/// Setup a server home with `partners.json` and PEM certificates, then build both routers.
pub async fn setup_test_app() -> TestApp {
    let home = TempDir::new().unwrap();
    let home_path = home.path().to_string_lossy().into_owned();
    let config = ServerConfig::from_lookup(|key| match key {
        "AS2_HOME" => Some(home_path.clone()),
        "AS2_HTTP_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    });
    config.validate().unwrap();
    config.directories.create_all().unwrap();

    std::fs::write(config.partners_file(), partners_json()).unwrap();

    let (local_cert, local_key) = ferroas2_crypto::testing::generate_identity(LOCAL);
    let (remote_cert, remote_key) = ferroas2_crypto::testing::generate_identity(REMOTE);
    let certs = &config.directories.certs;
    std::fs::write(certs.join(format!("{}.pem", LOCAL)), local_cert.to_pem().unwrap()).unwrap();
    std::fs::write(
        certs.join(format!("{}.key", LOCAL)),
        local_key.private_key_to_pem_pkcs8().unwrap(),
    )
    .unwrap();
    std::fs::write(certs.join(format!("{}.pem", REMOTE)), remote_cert.to_pem().unwrap()).unwrap();

    let services = services::initialize_services(&config).unwrap();
    let state = AppState::new(services.clone(), routes::MAX_BODY_BYTES);
    let scheduler = services::initialize_scheduler(&config, services).await.unwrap();

    TestApp {
        file_server: TestServer::new(routes::file_routes(state.clone())).unwrap(),
        mdn_server: TestServer::new(routes::mdn_routes(state.clone())).unwrap(),
        state,
        scheduler,
        config,
        remote_cert,
        remote_key,
        local_cert,
        _home: home,
    }
}

//! Test helpers: two trading partners on local HTTP listeners.
//!
//! Run from workspace root: `cargo test -p ferroas2-engine`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use ferroas2_core::models::{CompanyRecord, MdnMode, PartnerDirectory, PartnerRecord, SendSettings};
use ferroas2_core::{Directories, EventLevel, EventSink, Headers, Phase, ServerEvent};
use ferroas2_crypto::MemoryCertificateStore;
use ferroas2_engine::{
    As2Response, As2Services, AsyncMdnReceiver, EngineSettings, FileReceiver, InboundRequest,
};
use ferroas2_storage::FileSystemStore;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SENDER: &str = "acme";
pub const RECEIVER: &str = "partnerb";

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<ServerEvent>>);

impl RecordingSink {
    pub fn events(&self) -> Vec<ServerEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn has(&self, level: EventLevel, phase: Phase, text: &str) -> bool {
        self.events()
            .iter()
            .any(|e| e.level == level && e.phase == phase && e.text == text)
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ServerEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// One side of a trading relationship with its own home directory.
pub struct Party {
    pub services: Arc<As2Services>,
    pub dirs: Directories,
    pub events: Arc<RecordingSink>,
    _home: TempDir,
}

impl Party {
    pub fn new(
        as2id: &str,
        certs: MemoryCertificateStore,
        partners: Vec<PartnerRecord>,
        settings: EngineSettings,
    ) -> Self {
        let home = TempDir::new().unwrap();
        let dirs = Directories::resolve(home.path());
        dirs.create_all().unwrap();

        let company = CompanyRecord {
            as2id: as2id.to_string(),
            name: as2id.to_uppercase(),
            email: format!("edi@{}.example", as2id),
        };
        let events = Arc::new(RecordingSink::default());
        let services = As2Services::new(
            Arc::new(certs),
            Arc::new(FileSystemStore::new(dirs.clone())),
            Arc::new(PartnerDirectory::new(company, partners)),
            settings,
        )
        .unwrap()
        .with_events(events.clone());

        Self {
            services: Arc::new(services),
            dirs,
            events,
            _home: home,
        }
    }

    /// Drop `contents` into the outbox for `partner` and return its path.
    pub fn outbox_file(&self, partner: &str, name: &str, contents: &[u8]) -> PathBuf {
        let dir = self.dirs.partner_outbox(partner);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

pub fn partner(as2id: &str, url: &str, sign: &str, encrypt: &str, mdn_mode: MdnMode) -> PartnerRecord {
    PartnerRecord {
        as2id: as2id.to_string(),
        name: as2id.to_uppercase(),
        email: format!("as2@{}.example", as2id),
        send_settings: SendSettings {
            url: url.to_string(),
            sign_algorithm: sign.to_string(),
            encrypt_algorithm: encrypt.to_string(),
            content_type: "application/edi-x12".to_string(),
            mdn_mode,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn to_inbound(method: Method, uri: Uri, headers: &HeaderMap, body: Bytes) -> InboundRequest {
    InboundRequest {
        method: method.to_string(),
        uri: uri.to_string(),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect::<Headers>(),
        body,
        ..Default::default()
    }
}

fn into_response(response: As2Response) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in response.headers.iter() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(response.body)).unwrap()
}

async fn receive_file(
    State(receiver): State<Arc<FileReceiver>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    into_response(receiver.receive(to_inbound(method, uri, &headers, body)).await)
}

async fn receive_mdn(
    State(receiver): State<Arc<AsyncMdnReceiver>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    into_response(receiver.receive(to_inbound(method, uri, &headers, body)).await)
}

/// A listener on a free local port, with its base URL.
pub async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
}

/// Host a file endpoint for `services`.
pub fn serve_file_receiver(listener: TcpListener, services: Arc<As2Services>) {
    let router = Router::new()
        .route("/", any(receive_file))
        .with_state(Arc::new(FileReceiver::new(services)));
    serve(listener, router);
}

/// Host an async MDN endpoint for `services`.
pub fn serve_mdn_receiver(listener: TcpListener, services: Arc<As2Services>) {
    let router = Router::new()
        .route("/", any(receive_mdn))
        .with_state(Arc::new(AsyncMdnReceiver::new(services)));
    serve(listener, router);
}

/// Poll `condition` for up to five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    condition()
}

pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

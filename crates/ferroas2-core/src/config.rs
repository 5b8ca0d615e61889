//! Configuration module
//!
//! Server settings come from the environment (optionally via a `.env` file). The
//! on-disk layout under the AS2 home directory is described by [`Directories`].

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4080;
const DEFAULT_MDN_PORT: u16 = 4081;
const DEFAULT_PUBLIC_URL: &str = "http://localhost";
const DEFAULT_HOME: &str = "./as2-data";
const SEND_INTERVAL_SECS: u64 = 30;
const SCAN_INTERVAL_SECS: u64 = 5;
const HTTP_TIMEOUT_SECS: u64 = 120;

/// Where everything lives on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directories {
    pub home: PathBuf,
    pub system: PathBuf,
    pub inbox: PathBuf,
    pub outbox: PathBuf,
    pub certs: PathBuf,
    pub mdn: PathBuf,
    pub pending_mdn: PathBuf,
    pub pending_mdn_info: PathBuf,
    pub sent: PathBuf,
}

impl Directories {
    /// Layout derived from `home`, with `system/` holding MDNs, pending records and
    /// archived sends.
    pub fn resolve(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let system = home.join("system");
        Self::with_system(home, system)
    }

    fn with_system(home: PathBuf, system: PathBuf) -> Self {
        Self {
            inbox: home.join("inbox"),
            outbox: home.join("outbox"),
            certs: home.join("certs"),
            mdn: system.join("mdn"),
            pending_mdn: system.join("pending").join("mdn"),
            pending_mdn_info: system.join("pending").join("mdn-info"),
            sent: system.join("sent"),
            system,
            home,
        }
    }

    pub fn partner_outbox(&self, partner_id: &str) -> PathBuf {
        self.outbox.join(partner_id)
    }

    pub fn partner_inbox(&self, partner_id: &str) -> PathBuf {
        self.inbox.join(partner_id)
    }

    pub fn create_all(&self) -> anyhow::Result<()> {
        for dir in [
            &self.inbox,
            &self.outbox,
            &self.certs,
            &self.mdn,
            &self.pending_mdn,
            &self.pending_mdn_info,
            &self.sent,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub mdn_port: u16,
    pub public_url: String,
    pub directories: Directories,
    pub partners_file: PathBuf,
    pub send_interval_secs: u64,
    pub scan_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub log_json: bool,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = PathBuf::from(lookup("AS2_HOME").unwrap_or_else(|| DEFAULT_HOME.to_string()));
        let system = lookup("AS2_SYSTEM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("system"));

        let mut directories = Directories::with_system(home.clone(), system);
        if let Some(dir) = lookup("AS2_INBOX_DIR") {
            directories.inbox = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("AS2_OUTBOX_DIR") {
            directories.outbox = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("AS2_CERTS_DIR") {
            directories.certs = PathBuf::from(dir);
        }

        let partners_file = lookup("AS2_PARTNERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("partners.json"));

        Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            host: lookup("AS2_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(lookup("AS2_PORT"), DEFAULT_PORT),
            mdn_port: parse_or(lookup("AS2_MDN_PORT"), DEFAULT_MDN_PORT),
            public_url: lookup("AS2_PUBLIC_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            directories,
            partners_file,
            send_interval_secs: parse_or(lookup("AS2_SEND_INTERVAL_SECS"), SEND_INTERVAL_SECS),
            scan_interval_secs: parse_or(lookup("AS2_SCAN_INTERVAL_SECS"), SCAN_INTERVAL_SECS),
            http_timeout_secs: parse_or(lookup("AS2_HTTP_TIMEOUT_SECS"), HTTP_TIMEOUT_SECS),
            log_json: parse_or(lookup("LOG_JSON"), false),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.port == self.mdn_port {
            return Err(anyhow::anyhow!(
                "AS2_PORT and AS2_MDN_PORT must differ (both are {})",
                self.port
            ));
        }

        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "AS2_PUBLIC_URL must start with http:// or https://"
            ));
        }

        if self.send_interval_secs == 0 || self.scan_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "AS2_SEND_INTERVAL_SECS and AS2_SCAN_INTERVAL_SECS must be greater than zero"
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// URL partners should POST async MDNs to.
    pub fn async_mdn_url(&self) -> String {
        format!("{}:{}", self.public_url, self.mdn_port)
    }

    pub fn partners_file(&self) -> &Path {
        &self.partners_file
    }
}

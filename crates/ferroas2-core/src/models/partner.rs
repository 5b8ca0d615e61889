//! Trading partner and company records, loaded from the partners JSON file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONTENT_TYPE, DEFAULT_MDN_OPTIONS, DEFAULT_TRANSFER_ENCODING};
use crate::models::message::MdnMode;

/// The local AS2 identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub as2id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_mdn_options() -> String {
    DEFAULT_MDN_OPTIONS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSettings {
    #[serde(default)]
    pub url: String,
    /// Cipher alias; blank means the partner gets unencrypted content.
    #[serde(default)]
    pub encrypt_algorithm: String,
    /// Digest alias; blank means the partner gets unsigned content.
    #[serde(default)]
    pub sign_algorithm: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub mdn_mode: MdnMode,
    #[serde(default = "default_mdn_options")]
    pub mdn_options: String,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            encrypt_algorithm: String::new(),
            sign_algorithm: String::new(),
            content_type: default_content_type(),
            mdn_mode: MdnMode::default(),
            mdn_options: default_mdn_options(),
        }
    }
}

impl SendSettings {
    /// Always binary; not configurable.
    pub fn transfer_encoding(&self) -> &'static str {
        DEFAULT_TRANSFER_ENCODING
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRecord {
    pub as2id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: String,
    /// Certificate file name under the certs directory, when it differs from `<as2id>.pem`.
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub send_settings: SendSettings,
}

impl PartnerRecord {
    pub fn should_sign(&self) -> bool {
        !self.send_settings.sign_algorithm.trim().is_empty()
    }

    pub fn should_encrypt(&self) -> bool {
        !self.send_settings.encrypt_algorithm.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct PartnersFile {
    company: CompanyRecord,
    #[serde(default)]
    partners: Vec<PartnerRecord>,
}

/// Read-only lookup of the company and its partners.
#[derive(Debug, Clone, Default)]
pub struct PartnerDirectory {
    company: CompanyRecord,
    partners: HashMap<String, PartnerRecord>,
}

impl PartnerDirectory {
    pub fn new(company: CompanyRecord, partners: impl IntoIterator<Item = PartnerRecord>) -> Self {
        Self {
            company,
            partners: partners
                .into_iter()
                .map(|p| (p.as2id.clone(), p))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read partners file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to parse partners file {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let file: PartnersFile = serde_json::from_str(text)?;
        if file.company.as2id.trim().is_empty() {
            anyhow::bail!("company.as2id must not be empty");
        }
        for partner in &file.partners {
            if partner.as2id.trim().is_empty() {
                anyhow::bail!("every partner needs an as2id");
            }
        }
        Ok(Self::new(file.company, file.partners))
    }

    pub fn company(&self) -> &CompanyRecord {
        &self.company
    }

    pub fn partner(&self, as2id: &str) -> Option<&PartnerRecord> {
        self.partners.get(as2id)
    }

    /// Partners sorted by AS2 id.
    pub fn partners(&self) -> Vec<&PartnerRecord> {
        let mut list: Vec<&PartnerRecord> = self.partners.values().collect();
        list.sort_by(|a, b| a.as2id.cmp(&b.as2id));
        list
    }
}

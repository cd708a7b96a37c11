use super::{join_url, RegistryClient};
use crate::{
    error::{Error, Result},
    hashing::ContentFingerprint,
    timestamp,
    transport::Transport,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.curseforge.com";
const FINGERPRINTS_PATH: &str = "v1/fingerprints";
const SHA1_ALGO: u32 = 1;

#[derive(Debug, Serialize)]
struct FingerprintRequest<'a> {
    fingerprints: &'a [ContentFingerprint],
}

#[derive(Debug, Clone)]
pub struct RegistryMatch {
    pub fingerprint: ContentFingerprint,
    pub project_id: String,
    pub slug: Option<String>,
    pub latest_files: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatch {
    id: u64,
    file: RawMatchedFile,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    latest_files: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatchedFile {
    file_fingerprint: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub file_name: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_date: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default, deserialize_with = "known_hashes")]
    pub hashes: Vec<FileHash>,
}

impl RemoteFile {
    pub fn sha1(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|hash| hash.algo == SHA1_ALGO && !hash.value.trim().is_empty())
            .map(|hash| hash.value.trim())
    }

    pub fn published_at(&self) -> Option<i64> {
        self.file_date.as_deref().and_then(timestamp::parse_timestamp)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileHash {
    pub algo: u32,
    #[serde(default)]
    pub value: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Hash entries the registry mangled are dropped without losing the file.
fn known_hashes<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<FileHash>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

fn parse_files(raw: Vec<Value>, project_id: u64) -> Vec<RemoteFile> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<RemoteFile>(value) {
            Ok(file) => Some(file),
            Err(err) => {
                debug!("curseforge: skipping malformed file of project {project_id}: {err}");
                None
            }
        })
        .collect()
}

pub struct CurseForgeClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: Option<String>,
}

impl CurseForgeClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

impl RegistryClient for CurseForgeClient {
    fn lookup_by_fingerprints(
        &self,
        fingerprints: &[ContentFingerprint],
    ) -> Result<Vec<RegistryMatch>> {
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::to_value(FingerprintRequest { fingerprints })?;
        let url = join_url(&self.base_url, FINGERPRINTS_PATH);
        let mut headers = vec![("Content-Type", "application/json")];
        if let Some(key) = self.api_key.as_deref() {
            headers.push(("x-api-key", key));
        }
        info!(count = fingerprints.len(), "curseforge: looking up fingerprints");
        let response = self.transport.post_json(&url, &headers, &body)?;
        parse_response(response)
    }
}

fn parse_response(response: Value) -> Result<Vec<RegistryMatch>> {
    let Some(Value::Array(entries)) = response
        .get("data")
        .and_then(|data| data.get("exactMatches"))
        .cloned()
    else {
        return Err(Error::Parse(
            "curseforge response has no data.exactMatches array".to_string(),
        ));
    };
    let mut matches = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<RawMatch>(entry) {
            Ok(raw) => matches.push(RegistryMatch {
                fingerprint: raw.file.file_fingerprint,
                project_id: raw.id.to_string(),
                slug: raw.slug,
                latest_files: parse_files(raw.latest_files, raw.id),
            }),
            Err(err) => debug!("curseforge: skipping malformed match: {err}"),
        }
    }
    Ok(matches)
}

use super::{join_url, RegistryClient};
use crate::{
    error::{Error, Result},
    hashing::ContentDigest,
    package::LookupConstraints,
    transport::Transport,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.modrinth.com/v2";
const UPDATE_PATH: &str = "version_files/update";

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    hashes: &'a [ContentDigest],
    algorithm: &'static str,
    loaders: Vec<&'static str>,
    game_versions: Vec<&'a str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionRecord {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version_number: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

impl VersionRecord {
    /// The file flagged primary, else the first one listed.
    pub fn primary_file(&self) -> Option<&VersionFile> {
        self.files
            .iter()
            .find(|file| file.primary)
            .or_else(|| self.files.first())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionFile {
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub hashes: FileHashes,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileHashes {
    #[serde(default)]
    pub sha1: Option<String>,
}

pub struct ModrinthClient {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl ModrinthClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }
}

impl RegistryClient for ModrinthClient {
    fn lookup_by_digests(
        &self,
        digests: &[ContentDigest],
        constraints: &LookupConstraints,
    ) -> Result<HashMap<ContentDigest, VersionRecord>> {
        if digests.is_empty() {
            return Ok(HashMap::new());
        }
        let body = build_request(digests, constraints)?;
        let url = join_url(&self.base_url, UPDATE_PATH);
        info!(count = digests.len(), "modrinth: looking up digests");
        let response = self.transport.post_json(
            &url,
            &[("Content-Type", "application/json")],
            &body,
        )?;
        parse_response(response)
    }
}

fn build_request(digests: &[ContentDigest], constraints: &LookupConstraints) -> Result<Value> {
    let game_versions = if constraints.game_version.is_empty() {
        Vec::new()
    } else {
        vec![constraints.game_version.as_str()]
    };
    let request = UpdateRequest {
        hashes: digests,
        algorithm: "sha1",
        loaders: constraints
            .loaders
            .iter()
            .map(|loader| loader.modrinth_name())
            .collect(),
        game_versions,
    };
    Ok(serde_json::to_value(&request)?)
}

fn parse_response(response: Value) -> Result<HashMap<ContentDigest, VersionRecord>> {
    let Value::Object(entries) = response else {
        return Err(Error::Parse(
            "modrinth update response is not an object".to_string(),
        ));
    };
    let mut records = HashMap::new();
    for (digest, entry) in entries {
        if !entry.is_object() {
            debug!(%digest, "modrinth: skipping non-object version entry");
            continue;
        }
        match serde_json::from_value::<VersionRecord>(entry) {
            Ok(record) => {
                records.insert(digest.to_ascii_lowercase(), record);
            }
            Err(err) => debug!(%digest, "modrinth: skipping malformed version: {err}"),
        }
    }
    Ok(records)
}

use crate::hashing::{self, ContentDigest};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPackage {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub file: PathBuf,
}

impl LocalPackage {
    pub fn new(id: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            file: file.into(),
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            return name.to_string();
        }
        if !self.id.trim().is_empty() {
            return self.id.clone();
        }
        self.file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registry {
    Modrinth,
    #[serde(rename = "curseforge")]
    CurseForge,
}

impl Registry {
    pub fn display_name(self) -> &'static str {
        match self {
            Registry::Modrinth => "Modrinth",
            Registry::CurseForge => "CurseForge",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loader {
    Fabric,
    Forge,
    #[serde(rename = "neoforge")]
    NeoForge,
    Quilt,
    #[serde(rename = "liteloader")]
    LiteLoader,
}

impl Loader {
    pub fn all() -> [Loader; 5] {
        [
            Loader::Fabric,
            Loader::Forge,
            Loader::NeoForge,
            Loader::Quilt,
            Loader::LiteLoader,
        ]
    }

    pub fn modrinth_name(self) -> &'static str {
        match self {
            Loader::Fabric => "fabric",
            Loader::Forge => "forge",
            Loader::NeoForge => "neoforge",
            Loader::Quilt => "quilt",
            Loader::LiteLoader => "liteloader",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Loader::Fabric => "Fabric",
            Loader::Forge => "Forge",
            Loader::NeoForge => "NeoForge",
            Loader::Quilt => "Quilt",
            Loader::LiteLoader => "LiteLoader",
        }
    }

    /// True when a CurseForge version tag names this loader.
    pub fn matches_tag(self, tag: &str) -> bool {
        let tag = tag.trim();
        tag.eq_ignore_ascii_case(self.display_name())
            || tag.eq_ignore_ascii_case(self.modrinth_name())
    }

    pub fn parse(value: &str) -> Option<Loader> {
        Loader::all()
            .into_iter()
            .find(|loader| loader.matches_tag(value))
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What the caller is running. Empty fields accept anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupConstraints {
    pub game_version: String,
    pub loaders: Vec<Loader>,
}

impl LookupConstraints {
    pub fn new(game_version: impl Into<String>, loaders: Vec<Loader>) -> Self {
        Self {
            game_version: game_version.into().trim().to_string(),
            loaders,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateCandidate {
    pub package: LocalPackage,
    pub current_file: PathBuf,
    pub current_digest: ContentDigest,
    pub registry: Registry,
    pub project_id: String,
    pub project_slug: Option<String>,
    pub version_title: String,
    pub version_number: String,
    pub file_name: String,
    pub download_url: String,
    pub remote_digest: Option<ContentDigest>,
    pub published_at: Option<i64>,
    pub changelog: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteRelease {
    pub project_id: String,
    pub project_slug: Option<String>,
    pub version_title: String,
    pub version_number: String,
    pub file_name: String,
    pub download_url: String,
    pub remote_digest: Option<ContentDigest>,
    pub published_at: Option<i64>,
    pub changelog: Option<String>,
}

impl UpdateCandidate {
    /// Returns `None` when the remote file is the one already installed.
    pub fn new(
        package: &LocalPackage,
        current_digest: &str,
        registry: Registry,
        release: RemoteRelease,
    ) -> Option<Self> {
        if let Some(remote) = release.remote_digest.as_deref() {
            if hashing::digests_match(remote, current_digest) {
                return None;
            }
        }
        Some(Self {
            package: package.clone(),
            current_file: package.file.clone(),
            current_digest: current_digest.to_string(),
            registry,
            project_id: release.project_id,
            project_slug: release.project_slug,
            version_title: release.version_title,
            version_number: release.version_number,
            file_name: release.file_name,
            download_url: release.download_url,
            remote_digest: release.remote_digest,
            published_at: release.published_at,
            changelog: release.changelog,
            selected: true,
        })
    }

    pub fn display_name(&self) -> String {
        self.package.display_name()
    }

    pub fn key(&self) -> &Path {
        &self.current_file
    }
}

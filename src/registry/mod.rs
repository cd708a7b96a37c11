pub mod curseforge;
pub mod modrinth;

use crate::{
    error::Result,
    hashing::{ContentDigest, ContentFingerprint},
    package::LookupConstraints,
};
use std::collections::HashMap;

pub use curseforge::{CurseForgeClient, FileHash, RegistryMatch, RemoteFile};
pub use modrinth::{ModrinthClient, VersionFile, VersionRecord};

pub trait RegistryClient: Send + Sync {
    /// Latest version per digest, keyed by the lowercase digest that was sent.
    fn lookup_by_digests(
        &self,
        _digests: &[ContentDigest],
        _constraints: &LookupConstraints,
    ) -> Result<HashMap<ContentDigest, VersionRecord>> {
        Ok(HashMap::new())
    }

    fn lookup_by_fingerprints(
        &self,
        _fingerprints: &[ContentFingerprint],
    ) -> Result<Vec<RegistryMatch>> {
        Ok(Vec::new())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

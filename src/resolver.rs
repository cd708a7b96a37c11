use crate::{
    cancel::CancelToken,
    compat,
    hashing::{self, ContentDigest, ContentFingerprint},
    package::{LocalPackage, LookupConstraints, Registry, RemoteRelease, UpdateCandidate},
    registry::{RegistryClient, RegistryMatch, VersionRecord},
    timestamp,
};
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};
use tracing::{debug, info, warn};

// Registry failures cost only the updates they would have found.
pub struct UpdateResolver {
    digest_registry: Box<dyn RegistryClient>,
    fingerprint_registry: Box<dyn RegistryClient>,
    constraints: LookupConstraints,
}

struct Hashed<'a> {
    package: &'a LocalPackage,
    digest: ContentDigest,
}

impl UpdateResolver {
    pub fn new(
        digest_registry: Box<dyn RegistryClient>,
        fingerprint_registry: Box<dyn RegistryClient>,
        constraints: LookupConstraints,
    ) -> Self {
        Self {
            digest_registry,
            fingerprint_registry,
            constraints,
        }
    }

    pub fn resolve(&self, packages: &[LocalPackage]) -> Vec<UpdateCandidate> {
        self.resolve_with_cancel(packages, &CancelToken::new())
    }

    pub fn resolve_with_cancel(
        &self,
        packages: &[LocalPackage],
        cancel: &CancelToken,
    ) -> Vec<UpdateCandidate> {
        info!(count = packages.len(), "update check started");
        let hashed = digest_packages(packages, cancel);
        if cancel.is_cancelled() {
            info!("update check cancelled while hashing");
            return Vec::new();
        }

        let mut candidates = self.resolve_by_digest(&hashed);
        if cancel.is_cancelled() {
            info!("update check cancelled after Modrinth");
            return candidates;
        }

        let resolved: HashSet<PathBuf> = candidates
            .iter()
            .map(|candidate| candidate.current_file.clone())
            .collect();
        let remaining: Vec<&Hashed> = hashed
            .iter()
            .filter(|entry| !resolved.contains(&entry.package.file))
            .collect();
        candidates.extend(self.resolve_by_fingerprint(&remaining, cancel));

        info!(count = candidates.len(), "update check finished");
        candidates
    }

    fn resolve_by_digest(&self, hashed: &[Hashed]) -> Vec<UpdateCandidate> {
        let mut by_digest: HashMap<&str, &Hashed> = HashMap::new();
        for entry in hashed {
            by_digest.insert(entry.digest.as_str(), entry);
        }
        if by_digest.is_empty() {
            return Vec::new();
        }

        let digests: Vec<ContentDigest> =
            by_digest.keys().map(|digest| digest.to_string()).collect();
        let records = match self
            .digest_registry
            .lookup_by_digests(&digests, &self.constraints)
        {
            Ok(records) => records,
            Err(err) => {
                warn!("Modrinth lookup failed: {err}");
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for (digest, record) in records {
            let Some(entry) = by_digest.get(digest.as_str()) else {
                debug!(%digest, "Modrinth returned a digest that was not asked for");
                continue;
            };
            if let Some(candidate) = modrinth_candidate(entry, &record) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    fn resolve_by_fingerprint(
        &self,
        remaining: &[&Hashed],
        cancel: &CancelToken,
    ) -> Vec<UpdateCandidate> {
        let mut by_fingerprint: HashMap<ContentFingerprint, &Hashed> = HashMap::new();
        for entry in remaining {
            if cancel.is_cancelled() {
                info!("update check cancelled while fingerprinting");
                return Vec::new();
            }
            match hashing::fingerprint(&entry.package.file) {
                Ok(fingerprint) => {
                    by_fingerprint.insert(fingerprint, *entry);
                }
                Err(err) => warn!(
                    "Failed to fingerprint {}: {err}",
                    entry.package.file.display()
                ),
            }
        }
        if by_fingerprint.is_empty() {
            return Vec::new();
        }

        let fingerprints: Vec<ContentFingerprint> = by_fingerprint.keys().copied().collect();
        let matches = match self.fingerprint_registry.lookup_by_fingerprints(&fingerprints) {
            Ok(matches) => matches,
            Err(err) => {
                warn!("CurseForge lookup failed: {err}");
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for matched in matches {
            let Some(entry) = by_fingerprint.get(&matched.fingerprint) else {
                debug!(
                    fingerprint = matched.fingerprint,
                    "CurseForge returned a fingerprint that was not asked for"
                );
                continue;
            };
            if let Some(candidate) = self.curseforge_candidate(entry, &matched) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    fn curseforge_candidate(
        &self,
        entry: &Hashed,
        matched: &RegistryMatch,
    ) -> Option<UpdateCandidate> {
        let Some(file) = compat::select_best(
            &matched.latest_files,
            &self.constraints.game_version,
            &self.constraints.loaders,
        ) else {
            debug!(
                project = %matched.project_id,
                "No compatible CurseForge file for {}",
                entry.package.display_name()
            );
            return None;
        };
        let Some(download_url) = file.download_url.clone().filter(|url| !url.is_empty()) else {
            debug!(
                project = %matched.project_id,
                "CurseForge file {} has no download URL",
                file.file_name
            );
            return None;
        };
        if file.file_name.is_empty() {
            debug!(project = %matched.project_id, "CurseForge file has no name");
            return None;
        }
        let title = if file.display_name.is_empty() {
            file.file_name.clone()
        } else {
            file.display_name.clone()
        };
        let release = RemoteRelease {
            project_id: matched.project_id.clone(),
            project_slug: matched.slug.clone(),
            version_title: title.clone(),
            version_number: title,
            file_name: file.file_name.clone(),
            download_url,
            remote_digest: file.sha1().map(str::to_ascii_lowercase),
            published_at: file.published_at(),
            changelog: None,
        };
        UpdateCandidate::new(entry.package, &entry.digest, Registry::CurseForge, release)
    }
}

fn digest_packages<'a>(packages: &'a [LocalPackage], cancel: &CancelToken) -> Vec<Hashed<'a>> {
    let mut hashed = Vec::with_capacity(packages.len());
    for package in packages {
        if cancel.is_cancelled() {
            break;
        }
        match hashing::digest(&package.file) {
            Ok(digest) => hashed.push(Hashed { package, digest }),
            Err(err) => warn!("Failed to hash {}: {err}", package.file.display()),
        }
    }
    hashed
}

fn modrinth_candidate(entry: &Hashed, record: &VersionRecord) -> Option<UpdateCandidate> {
    let name = entry.package.display_name();
    let Some(file) = record.primary_file() else {
        debug!("Modrinth version for {name} lists no files");
        return None;
    };
    let (Some(project_id), Some(file_name), Some(url)) = (
        record.project_id.clone(),
        file.filename.clone(),
        file.url.clone(),
    ) else {
        warn!("Modrinth version for {name} is missing project, filename or url");
        return None;
    };
    let release = RemoteRelease {
        project_id,
        project_slug: None,
        version_title: record.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        version_number: record.version_number.clone().unwrap_or_default(),
        file_name,
        download_url: url,
        remote_digest: file.hashes.sha1.as_deref().map(str::to_ascii_lowercase),
        published_at: record
            .date_published
            .as_deref()
            .and_then(timestamp::parse_timestamp),
        changelog: record.changelog.clone(),
    };
    UpdateCandidate::new(entry.package, &entry.digest, Registry::Modrinth, release)
}

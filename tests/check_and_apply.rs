use modsentry::{
    hashing,
    registry::{CurseForgeClient, ModrinthClient},
    transport::Transport,
    CancelToken, LocalPackage, Loader, LookupConstraints, Registry, UpdateExecutor,
    UpdateResolver,
};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

const MODRINTH: &str = "https://modrinth.test/v2";
const CURSEFORGE: &str = "https://curseforge.test";

#[derive(Default)]
struct Network {
    posts: HashMap<String, Value>,
    files: HashMap<String, Vec<u8>>,
    sent: Mutex<Vec<(String, Value)>>,
}

impl Transport for Network {
    fn post_json(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        body: &Value,
    ) -> modsentry::error::Result<Value> {
        self.sent.lock().unwrap().push((url.to_string(), body.clone()));
        self.posts
            .get(url)
            .cloned()
            .ok_or_else(|| modsentry::Error::Network(format!("HTTP 404 from {url}")))
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> modsentry::error::Result<u64> {
        let bytes = self
            .files
            .get(url)
            .ok_or_else(|| modsentry::Error::Network(format!("HTTP 503 from {url}")))?;
        sink.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }
}

fn install(dir: &Path, name: &str, bytes: &[u8]) -> LocalPackage {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    LocalPackage::new(name.trim_end_matches(".jar"), path)
}

fn sha1(bytes: &[u8]) -> String {
    hashing::digest_reader(bytes).unwrap()
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn check_then_apply_selected_updates() {
    let dir = tempfile::tempdir().unwrap();
    let mods = dir.path();
    let packages = vec![
        install(mods, "sodium-0.5.2.jar", b"sodium old"),
        install(mods, "jei-15.2.0.26.jar", b"jei old"),
        install(mods, "journeymap-5.9.jar", b"journeymap old"),
        install(mods, "lithium-0.11.jar", b"lithium current"),
    ];
    fs::write(mods.join("jei-15.2.0.26.jar.disabled"), b"").unwrap();

    let sodium_new = b"sodium new".to_vec();
    let jei_new = b"jei new".to_vec();
    let mut network = Network::default();
    network.posts.insert(
        format!("{MODRINTH}/version_files/update"),
        json!({
            sha1(b"sodium old"): {
                "project_id": "AANobbMI",
                "name": "Sodium 0.5.3",
                "version_number": "mc1.20.1-0.5.3",
                "date_published": "2023-09-20T10:00:00Z",
                "files": [{
                    "primary": true,
                    "hashes": { "sha1": sha1(&sodium_new) },
                    "filename": "sodium-0.5.3.jar",
                    "url": "https://cdn.modrinth.test/sodium-0.5.3.jar"
                }]
            },
            sha1(b"lithium current"): {
                "project_id": "gvQqBUqZ",
                "name": "Lithium 0.11",
                "version_number": "0.11",
                "files": [{
                    "primary": true,
                    "hashes": { "sha1": sha1(b"lithium current") },
                    "filename": "lithium-0.11.jar",
                    "url": "https://cdn.modrinth.test/lithium-0.11.jar"
                }]
            }
        }),
    );
    network.posts.insert(
        format!("{CURSEFORGE}/v1/fingerprints"),
        json!({
            "data": {
                "exactMatches": [
                    {
                        "id": 238222,
                        "slug": "jei",
                        "file": { "fileFingerprint": hashing::fingerprint_bytes(b"jei old") },
                        "latestFiles": [
                            {
                                "displayName": "jei-1.19.2",
                                "fileName": "jei-1.19.2-forge.jar",
                                "fileDate": "2024-01-01T00:00:00Z",
                                "downloadUrl": "https://forgecdn.test/jei-1.19.2.jar",
                                "gameVersions": ["1.19.2", "Forge"],
                                "hashes": []
                            },
                            {
                                "displayName": "jei-15.2.0.27",
                                "fileName": "jei-15.2.0.27.jar",
                                "fileDate": "2023-10-01T12:00:00Z",
                                "downloadUrl": "https://forgecdn.test/jei-15.2.0.27.jar",
                                "gameVersions": ["1.20.1", "Forge"],
                                "hashes": [{ "algo": 1, "value": sha1(&jei_new) }]
                            }
                        ]
                    },
                    {
                        "id": 32274,
                        "slug": "journeymap",
                        "file": { "fileFingerprint": hashing::fingerprint_bytes(b"journeymap old") },
                        "latestFiles": [{
                            "displayName": "journeymap-5.9.7",
                            "fileName": "journeymap-5.9.7.jar",
                            "fileDate": "2023-11-01T00:00:00Z",
                            "downloadUrl": "https://forgecdn.test/journeymap-5.9.7.jar",
                            "gameVersions": ["1.20.1", "Forge"],
                            "hashes": [{ "algo": 1, "value": "feedface" }]
                        }]
                    }
                ]
            }
        }),
    );
    network
        .files
        .insert("https://cdn.modrinth.test/sodium-0.5.3.jar".to_string(), sodium_new.clone());
    network
        .files
        .insert("https://forgecdn.test/jei-15.2.0.27.jar".to_string(), jei_new.clone());
    network.files.insert(
        "https://forgecdn.test/journeymap-5.9.7.jar".to_string(),
        b"journeymap new".to_vec(),
    );
    let network = Arc::new(network);

    let resolver = UpdateResolver::new(
        Box::new(ModrinthClient::new(network.clone(), MODRINTH)),
        Box::new(CurseForgeClient::new(
            network.clone(),
            CURSEFORGE,
            Some("key".to_string()),
        )),
        LookupConstraints::new("1.20.1", vec![Loader::Forge, Loader::Fabric]),
    );
    let candidates = resolver.resolve(&packages);

    let by_file: HashMap<String, Registry> = candidates
        .iter()
        .map(|candidate| (candidate.file_name.clone(), candidate.registry))
        .collect();
    assert_eq!(by_file.len(), 3);
    assert_eq!(by_file["sodium-0.5.3.jar"], Registry::Modrinth);
    assert_eq!(by_file["jei-15.2.0.27.jar"], Registry::CurseForge);
    assert_eq!(by_file["journeymap-5.9.7.jar"], Registry::CurseForge);
    assert_eq!(candidates[0].registry, Registry::Modrinth);

    {
        let sent = network.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let fingerprints = sent[1].1["fingerprints"].as_array().unwrap();
        assert_eq!(fingerprints.len(), 3);
        let sodium_fp = json!(hashing::fingerprint_bytes(b"sodium old"));
        assert!(!fingerprints.contains(&sodium_fp));
    }

    // The user unticks journeymap; ticks are tracked per installed file.
    let unticked: HashSet<PathBuf> = candidates
        .iter()
        .filter(|candidate| candidate.file_name.starts_with("journeymap"))
        .map(|candidate| candidate.key().to_path_buf())
        .collect();
    assert_eq!(unticked.len(), 1);

    let executor = UpdateExecutor::new(network.clone(), mods);
    let report = executor.apply_all(
        &candidates,
        |candidate| !unticked.contains(candidate.key()),
        &CancelToken::new(),
    );
    assert_eq!((report.succeeded, report.failed), (2, 0));
    assert_eq!(
        listing(mods),
        vec![
            "jei-15.2.0.27.jar".to_string(),
            "journeymap-5.9.jar".to_string(),
            "lithium-0.11.jar".to_string(),
            "sodium-0.5.3.jar".to_string(),
        ]
    );
    assert_eq!(fs::read(mods.join("sodium-0.5.3.jar")).unwrap(), sodium_new);
    assert_eq!(fs::read(mods.join("jei-15.2.0.27.jar")).unwrap(), jei_new);
}

#[test]
fn second_download_failing_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mods = dir.path();
    let packages = vec![
        install(mods, "a-1.jar", b"a1"),
        install(mods, "b-1.jar", b"b1"),
        install(mods, "c-1.jar", b"c1"),
    ];
    let mut records = serde_json::Map::new();
    for (package, name) in packages.iter().zip(["a-2.jar", "b-2.jar", "c-2.jar"]) {
        records.insert(
            hashing::digest(&package.file).unwrap(),
            json!({
                "project_id": package.id,
                "name": name,
                "version_number": "2",
                "files": [{ "filename": name, "url": format!("https://cdn.test/{name}") }]
            }),
        );
    }
    let mut network = Network::default();
    network
        .posts
        .insert(format!("{MODRINTH}/version_files/update"), Value::Object(records));
    network
        .files
        .insert("https://cdn.test/a-2.jar".to_string(), b"a2".to_vec());
    network
        .files
        .insert("https://cdn.test/c-2.jar".to_string(), b"c2".to_vec());
    let network = Arc::new(network);

    let resolver = UpdateResolver::new(
        Box::new(ModrinthClient::new(network.clone(), MODRINTH)),
        Box::new(CurseForgeClient::new(network.clone(), CURSEFORGE, None)),
        LookupConstraints::default(),
    );
    let mut candidates = resolver.resolve(&packages);
    assert_eq!(candidates.len(), 3);
    candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let executor = UpdateExecutor::new(network, mods);
    let report = executor.apply_selected(&candidates, &CancelToken::new());
    assert_eq!((report.succeeded, report.failed), (2, 1));
    assert!(matches!(report.errors[0].source, modsentry::Error::Network(_)));
    assert_eq!(
        listing(mods),
        vec!["a-2.jar".to_string(), "b-1.jar".to_string(), "c-2.jar".to_string()]
    );
}

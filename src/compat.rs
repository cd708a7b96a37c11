use crate::{package::Loader, registry::RemoteFile};

// Undated files sort as oldest. Equal dates keep the first listed.
pub fn select_best<'a>(
    files: &'a [RemoteFile],
    game_version: &str,
    loaders: &[Loader],
) -> Option<&'a RemoteFile> {
    let mut best: Option<(&RemoteFile, i64)> = None;
    for file in files.iter().filter(|file| is_compatible(file, game_version, loaders)) {
        let published = file.published_at().unwrap_or(0);
        match best {
            Some((_, current)) if current >= published => {}
            _ => best = Some((file, published)),
        }
    }
    best.map(|(file, _)| file)
}

pub fn is_compatible(file: &RemoteFile, game_version: &str, loaders: &[Loader]) -> bool {
    let game_version = game_version.trim();
    let version_ok = game_version.is_empty()
        || file
            .game_versions
            .iter()
            .any(|tag| tag.trim() == game_version);
    if !version_ok {
        return false;
    }
    loaders.is_empty()
        || file
            .game_versions
            .iter()
            .any(|tag| loaders.iter().any(|loader| loader.matches_tag(tag)))
}

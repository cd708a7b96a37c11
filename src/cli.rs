use anyhow::{bail, Context, Result};
use modsentry::{
    config::{self, AppConfig},
    executor::{ApplyReport, UpdateExecutor},
    hashing,
    logging::{self, Verbosity},
    package::{LocalPackage, Loader, LookupConstraints, UpdateCandidate},
    registry::{CurseForgeClient, ModrinthClient},
    resolver::UpdateResolver,
    timestamp,
    transport::{Transport, UreqTransport},
    CancelToken,
};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

const MOD_EXTENSIONS: &[&str] = &["jar", "zip", "litemod"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct GlobalOptions {
    format: OutputFormat,
    verbosity: Verbosity,
    game_version: Option<String>,
    loaders: Option<Vec<Loader>>,
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Check { mods_dir: PathBuf },
    Update(UpdateOptions),
    Hash { files: Vec<PathBuf> },
    Help,
    Version,
}

#[derive(Debug, PartialEq)]
struct UpdateOptions {
    mods_dir: PathBuf,
    only: Vec<String>,
    dry_run: bool,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, command) = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            println!("modsentry v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    logging::init(global.verbosity)?;
    match command {
        CliCommand::Check { mods_dir } => check(&global, &mods_dir),
        CliCommand::Update(options) => update(&global, options),
        CliCommand::Hash { files } => hash_files(&files, global.format),
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn parse_args(args: &[String]) -> Result<(GlobalOptions, CliCommand)> {
    let (global, tokens) = parse_global_options(args)?;
    let Some(head) = tokens.first() else {
        return Ok((global, CliCommand::Help));
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "check" => CliCommand::Check {
            mods_dir: single_dir(rest, "check")?,
        },
        "update" => CliCommand::Update(parse_update(rest)?),
        "hash" => {
            if rest.is_empty() {
                bail!("hash requires one or more files");
            }
            CliCommand::Hash {
                files: rest.iter().map(PathBuf::from).collect(),
            }
        }
        other => bail!("Unknown command: {other} (try 'modsentry help')"),
    };
    Ok((global, command))
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut format = OutputFormat::Text;
    let mut verbosity = Verbosity::Normal;
    let mut game_version = None;
    let mut loaders: Option<Vec<Loader>> = None;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        match flag {
            "--format" => {
                let value = flag_value(flag, inline, &mut iter)?;
                format = OutputFormat::parse(&value)
                    .with_context(|| format!("Unknown format: {value} (use 'text' or 'json')"))?;
            }
            "--game-version" => {
                game_version = Some(flag_value(flag, inline, &mut iter)?);
            }
            "--loader" => {
                let value = flag_value(flag, inline, &mut iter)?;
                let list = loaders.get_or_insert_with(Vec::new);
                for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    if name.eq_ignore_ascii_case("any") {
                        list.clear();
                        continue;
                    }
                    let loader =
                        Loader::parse(name).with_context(|| format!("Unknown loader: {name}"))?;
                    if !list.contains(&loader) {
                        list.push(loader);
                    }
                }
            }
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            "--verbose" => verbosity = Verbosity::Verbose,
            "--verbosity" => {
                let level = flag_value(flag, inline, &mut iter)?;
                verbosity = match level.as_str() {
                    "quiet" => Verbosity::Quiet,
                    "normal" => Verbosity::Normal,
                    "verbose" | "info" => Verbosity::Verbose,
                    "debug" | "trace" => Verbosity::Debug,
                    _ => bail!("Unknown verbosity: {level}"),
                };
            }
            _ if arg.starts_with("-v") && arg[1..].chars().all(|ch| ch == 'v') => {
                let count = arg.chars().filter(|ch| *ch == 'v').count();
                verbosity = if count >= 2 {
                    Verbosity::Debug
                } else {
                    Verbosity::Verbose
                };
            }
            _ => tokens.push(arg.to_string()),
        }
    }

    Ok((
        GlobalOptions {
            format,
            verbosity,
            game_version,
            loaders,
        },
        tokens,
    ))
}

fn flag_value<'a>(
    flag: &str,
    inline: Option<String>,
    iter: &mut impl Iterator<Item = &'a String>,
) -> Result<String> {
    match inline {
        Some(value) => Ok(value),
        None => iter
            .next()
            .cloned()
            .with_context(|| format!("{flag} requires a value")),
    }
}

fn single_dir(args: &[String], command: &str) -> Result<PathBuf> {
    match args {
        [dir] => Ok(PathBuf::from(dir)),
        [] => bail!("{command} requires a mods directory"),
        _ => bail!("{command} takes exactly one mods directory"),
    }
}

fn parse_update(args: &[String]) -> Result<UpdateOptions> {
    let mut mods_dir = None;
    let mut only = Vec::new();
    let mut dry_run = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dry-run" | "-n" => dry_run = true,
            "--only" => {
                let value = iter.next().context("--only requires a mod name")?;
                only.extend(split_list(value));
            }
            value if value.starts_with("--only=") => {
                only.extend(split_list(value.trim_start_matches("--only=")));
            }
            value if value.starts_with('-') => bail!("Unknown update option: {value}"),
            value => {
                if mods_dir.replace(PathBuf::from(value)).is_some() {
                    bail!("update takes exactly one mods directory");
                }
            }
        }
    }
    Ok(UpdateOptions {
        mods_dir: mods_dir.context("update requires a mods directory")?,
        only,
        dry_run,
    })
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

fn load_config(global: &GlobalOptions) -> Result<(AppConfig, LookupConstraints)> {
    let config = AppConfig::load_or_create()
        .with_context(|| match config::config_path() {
            Ok(path) => format!("load {}", path.display()),
            Err(_) => "load config".to_string(),
        })?;
    let mut constraints = config.constraints();
    if let Some(version) = &global.game_version {
        constraints.game_version = version.trim().to_string();
    }
    if let Some(loaders) = &global.loaders {
        constraints.loaders = loaders.clone();
    }
    Ok((config, constraints))
}

fn build_resolver(
    config: &AppConfig,
    transport: Arc<dyn Transport>,
    constraints: LookupConstraints,
) -> UpdateResolver {
    UpdateResolver::new(
        Box::new(ModrinthClient::new(
            transport.clone(),
            config.modrinth_base_url.clone(),
        )),
        Box::new(CurseForgeClient::new(
            transport,
            config.curseforge_base_url.clone(),
            config.curseforge_api_key.clone(),
        )),
        constraints,
    )
}

fn find_updates(
    global: &GlobalOptions,
    mods_dir: &Path,
) -> Result<(Arc<dyn Transport>, Vec<UpdateCandidate>)> {
    let packages = scan_mods_dir(mods_dir)?;
    let (config, constraints) = load_config(global)?;
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new(&config.http_options()));
    if config.curseforge_api_key.is_none() {
        tracing::warn!(
            "No CurseForge API key configured; set {} to enable fingerprint lookups",
            config::API_KEY_ENV
        );
    }
    let resolver = build_resolver(&config, transport.clone(), constraints);
    let candidates = resolver.resolve(&packages);
    Ok((transport, candidates))
}

fn check(global: &GlobalOptions, mods_dir: &Path) -> Result<()> {
    let (_, candidates) = find_updates(global, mods_dir)?;
    print_candidates(&candidates, global.format)
}

fn update(global: &GlobalOptions, options: UpdateOptions) -> Result<()> {
    let (transport, mut candidates) = find_updates(global, &options.mods_dir)?;
    if !options.only.is_empty() {
        for candidate in &mut candidates {
            candidate.selected = options
                .only
                .iter()
                .any(|query| candidate_matches(candidate, query));
        }
    }

    let selected: Vec<UpdateCandidate> = candidates
        .into_iter()
        .filter(|candidate| candidate.selected)
        .collect();
    if options.dry_run || selected.is_empty() {
        return print_candidates(&selected, global.format);
    }

    let executor = UpdateExecutor::new(transport, &options.mods_dir);
    let report = executor.apply_selected(&selected, &CancelToken::new());
    print_report(&report, global.format)?;
    if !report.is_clean() {
        bail!("{} update(s) failed", report.failed);
    }
    Ok(())
}

fn candidate_matches(candidate: &UpdateCandidate, query: &str) -> bool {
    let query = query.to_lowercase();
    let file_name = candidate
        .current_file
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    candidate.display_name().to_lowercase() == query
        || candidate.package.id.to_lowercase() == query
        || file_name == query
        || candidate
            .project_slug
            .as_deref()
            .map(|slug| slug.eq_ignore_ascii_case(&query))
            .unwrap_or(false)
}

/// Flat listing of the mods directory; anything that looks like a mod jar,
/// enabled or not.
fn scan_mods_dir(dir: &Path) -> Result<Vec<LocalPackage>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }
    let mut packages = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("read {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(stem) = mod_stem(&name) else {
            continue;
        };
        packages.push(LocalPackage::new(stem, entry.into_path()));
    }
    Ok(packages)
}

fn mod_stem(file_name: &str) -> Option<String> {
    let base = file_name.strip_suffix(".disabled").unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || !MOD_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)) {
        return None;
    }
    Some(stem.to_string())
}

#[derive(Serialize)]
struct CandidateItem<'a> {
    name: String,
    current_file: String,
    registry: String,
    project_id: &'a str,
    project_slug: Option<&'a str>,
    version: &'a str,
    version_number: &'a str,
    file_name: &'a str,
    download_url: &'a str,
    published: Option<String>,
    changelog: Option<&'a str>,
}

fn print_candidates(candidates: &[UpdateCandidate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<CandidateItem> = candidates
                .iter()
                .map(|candidate| CandidateItem {
                    name: candidate.display_name(),
                    current_file: candidate.current_file.display().to_string(),
                    registry: candidate.registry.to_string(),
                    project_id: &candidate.project_id,
                    project_slug: candidate.project_slug.as_deref(),
                    version: &candidate.version_title,
                    version_number: &candidate.version_number,
                    file_name: &candidate.file_name,
                    download_url: &candidate.download_url,
                    published: candidate.published_at.and_then(timestamp::format_timestamp),
                    changelog: candidate.changelog.as_deref(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            if candidates.is_empty() {
                println!("All mods are up to date.");
                return Ok(());
            }
            println!("{} update(s) available:", candidates.len());
            for candidate in candidates {
                let current = candidate
                    .current_file
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                let published = candidate
                    .published_at
                    .and_then(timestamp::format_timestamp)
                    .map(|date| format!(", {date}"))
                    .unwrap_or_default();
                println!(
                    "  {}: {current} -> {} [{}{published}]",
                    candidate.display_name(),
                    candidate.file_name,
                    candidate.registry
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ReportItem {
    succeeded: usize,
    failed: usize,
    installed: Vec<String>,
    errors: Vec<String>,
}

fn print_report(report: &ApplyReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let item = ReportItem {
                succeeded: report.succeeded,
                failed: report.failed,
                installed: report
                    .installed
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect(),
                errors: report.errors.iter().map(|err| err.to_string()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        OutputFormat::Text => {
            for err in &report.errors {
                eprintln!("  {err}");
            }
            println!(
                "Updated {} mod(s), {} failed.",
                report.succeeded, report.failed
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct HashItem {
    path: String,
    sha1: String,
    fingerprint: u32,
}

fn hash_files(files: &[PathBuf], format: OutputFormat) -> Result<()> {
    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let sha1 = hashing::digest(path).with_context(|| format!("hash {}", path.display()))?;
        let fingerprint =
            hashing::fingerprint(path).with_context(|| format!("fingerprint {}", path.display()))?;
        items.push(HashItem {
            path: path.display().to_string(),
            sha1,
            fingerprint,
        });
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for item in items {
                println!("{}  {:>10}  {}", item.sha1, item.fingerprint, item.path);
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("modsentry v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  modsentry check <mods-dir>                 List available updates");
    println!("  modsentry update <mods-dir> [--only <mod>] [--dry-run]");
    println!("                                             Download and install updates");
    println!("  modsentry hash <file>...                   Print SHA-1 and CurseForge fingerprint");
    println!("  modsentry help | version");
    println!();
    println!("Options:");
    println!("  --game-version <ver>   Only accept files built for this game version");
    println!("  --loader <name>[,..]   fabric, forge, neoforge, quilt, liteloader, or any");
    println!("  --format text|json     Output format (default: text)");
    println!("  -v, -vv, -q            More or less logging (RUST_LOG overrides)");
    println!();
    println!("Settings live in the modsentry config.json under your local data dir.");
    println!("Set {} to query CurseForge.", config::API_KEY_ENV);
}

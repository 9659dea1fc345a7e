//! Command implementations for the artifact index tool.
//!
//! Each command loads layered settings, applies CLI overrides and calls into
//! the library crates. Output meant for the user goes to stdout; logs go to
//! stderr.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use index_packer::packer::properties_file_name;
use index_packer::{
    decode_file, pack, plan, read_summary, DirectoryFetcher, IndexProperties, IndexUpdater,
    PackRequest, UpdateOutcome,
};
use index_search::{ArtifactSearcher, SearchIndex, SearchIndexConfig, TantivySink};
use index_types::{artifact_uinfo, fields, Record, Settings};

/// Overrides shared by every command.
#[derive(Debug, Default, Clone)]
pub struct GlobalOverrides {
    pub config: Option<String>,
    pub log_level: Option<String>,
    pub index_path: Option<String>,
}

/// Overrides specific to `pack`.
#[derive(Debug, Default, Clone)]
pub struct PackOverrides {
    pub target_dir: Option<String>,
    pub prefix: Option<String>,
    pub max_chunks: Option<usize>,
    pub no_incremental: bool,
    pub no_snapshot: bool,
    pub checksums: bool,
    pub use_target_properties: bool,
}

/// Artifact fields accepted by `add`.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub last_modified: Option<i64>,
}

/// Load settings (defaults -> file -> env) and apply global CLI overrides.
pub fn load_settings(global: &GlobalOverrides) -> Result<Settings> {
    let mut settings =
        Settings::load(global.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = &global.index_path {
        settings.index_path = path.clone();
    }
    if let Some(level) = &global.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_index(settings: &Settings) -> Result<SearchIndex> {
    let config = SearchIndexConfig::new(settings.expanded_index_path())
        .with_index_id(settings.index_id.clone())
        .with_memory_mb(settings.writer_memory_mb);
    SearchIndex::open_or_create(config).context("Failed to open artifact index")
}

/// Apply `pack` overrides to settings and build the request.
pub fn pack_request(mut settings: Settings, overrides: &PackOverrides) -> Result<PackRequest> {
    if let Some(dir) = &overrides.target_dir {
        settings.target_dir = dir.clone();
    }
    if let Some(prefix) = &overrides.prefix {
        settings.file_prefix = prefix.clone();
    }
    if let Some(max_chunks) = overrides.max_chunks {
        settings.max_chunks = max_chunks;
    }
    if overrides.no_incremental {
        settings.create_incremental_chunks = false;
    }
    if overrides.checksums {
        settings.create_checksum_files = true;
    }
    if overrides.use_target_properties {
        settings.use_target_properties = true;
    }
    settings.validate().context("Invalid configuration")?;

    Ok(PackRequest::from_settings(&settings).with_full_snapshot(!overrides.no_snapshot))
}

/// Publish the live index.
pub fn run_pack(settings: Settings, overrides: &PackOverrides) -> Result<()> {
    let index = open_index(&settings)?;
    let request = pack_request(settings, overrides)?;
    let snapshot = index.snapshot().context("Failed to open index snapshot")?;

    info!(target = ?request.target_dir, "Publishing artifact index");
    let result = pack(&request, &snapshot).context("Publish failed")?;

    let mut out = io::stdout().lock();
    if let Some(path) = &result.snapshot {
        writeln!(out, "snapshot: {} ({} records)", path.display(), result.snapshot_records)?;
    }
    if let Some(path) = &result.chunk {
        writeln!(out, "chunk:    {} ({} records)", path.display(), result.chunk_records)?;
    }
    writeln!(
        out,
        "chain-id: {}  counter: {}{}",
        result.chain_id.as_deref().unwrap_or("-"),
        result.counter.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        if result.regenerated { "  (new chain)" } else { "" }
    )?;
    for removed in &result.removed_chunks {
        writeln!(out, "removed:  {}", removed.display())?;
    }
    Ok(())
}

/// Update the live index from a published directory.
pub fn run_update(settings: Settings, source: &str, prefix: Option<&str>) -> Result<()> {
    let prefix = prefix.unwrap_or(&settings.file_prefix).to_string();
    let index = open_index(&settings)?;
    let local_props = index.path().join(properties_file_name(&prefix));

    let mut sink = TantivySink::new(index.indexer().context("Failed to open index writer")?);
    let updater = IndexUpdater::new(DirectoryFetcher::new(source), prefix);
    let result = updater
        .update(&mut sink, &local_props)
        .with_context(|| format!("Update from {} failed", source))?;

    match result.outcome {
        UpdateOutcome::UpToDate => println!("up to date"),
        UpdateOutcome::Incremental { chunks, records } => {
            println!("applied {} chunk(s), {} record(s)", chunks, records)
        }
        UpdateOutcome::Full { records } => println!("full update, {} record(s)", records),
    }
    Ok(())
}

/// Print the chunk fetch plan for two properties files.
pub fn run_plan(local: &Path, remote: &Path, prefix: &str) -> Result<Vec<String>> {
    let local = IndexProperties::load(local)
        .with_context(|| format!("Failed to read {}", local.display()))?;
    let remote = IndexProperties::load(remote)
        .with_context(|| format!("Failed to read {}", remote.display()))?
        .with_context(|| format!("{} does not exist", remote.display()))?;

    match plan(local.as_ref(), &remote, prefix) {
        Some(files) => {
            for file in &files {
                println!("{}", file);
            }
            Ok(files)
        }
        None => {
            println!("full fetch required");
            Ok(Vec::new())
        }
    }
}

/// Decode a published file, printing records as JSON lines or a summary.
pub fn run_unpack(file: &Path, summary: bool, limit: Option<usize>) -> Result<()> {
    let reader =
        decode_file(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let mut out = io::stdout().lock();

    if summary {
        let summary = read_summary(reader).context("Failed to decode records")?;
        let timestamp = summary
            .timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "timestamp:   {}", timestamp)?;
        writeln!(out, "index-id:    {}", summary.index_id.as_deref().unwrap_or("-"))?;
        writeln!(out, "artifacts:   {}", summary.artifact_count)?;
        writeln!(out, "aggregates:  {}", summary.aggregate_count)?;
        writeln!(out, "groups:      {}", summary.all_groups.len())?;
        writeln!(out, "root groups: {}", summary.root_groups.len())?;
        if summary.unknown_count > 0 {
            writeln!(out, "unknown:     {}", summary.unknown_count)?;
        }
        return Ok(());
    }

    for record in reader.take(limit.unwrap_or(usize::MAX)) {
        let record = record.context("Failed to decode record")?;
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}

/// Build the record `add` inserts.
pub fn artifact_record(artifact: &NewArtifact) -> Record {
    let uinfo = artifact_uinfo(
        &artifact.group_id,
        &artifact.artifact_id,
        &artifact.version,
        artifact.classifier.as_deref(),
        &artifact.extension,
    );
    let last_modified = artifact
        .last_modified
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let mut record = Record::artifact(uinfo, last_modified)
        .with(fields::GROUP_ID, artifact.group_id.as_str())
        .with(fields::ARTIFACT_ID, artifact.artifact_id.as_str())
        .with(fields::VERSION, artifact.version.as_str())
        .with(fields::EXTENSION, artifact.extension.as_str());
    if let Some(classifier) = &artifact.classifier {
        record.set(fields::CLASSIFIER, classifier.as_str());
    }
    if let Some(name) = &artifact.name {
        record.set(fields::NAME, name.as_str());
    }
    if let Some(description) = &artifact.description {
        record.set(fields::DESCRIPTION, description.as_str());
    }
    record
}

/// Insert or replace one artifact and commit.
pub fn run_add(settings: Settings, artifact: &NewArtifact) -> Result<()> {
    let index = open_index(&settings)?;
    let indexer = index.indexer().context("Failed to open index writer")?;
    let record = artifact_record(artifact);
    indexer
        .index_record(&record)
        .context("Failed to index artifact")?;
    indexer.commit().context("Failed to commit index")?;
    println!("{}", record.uinfo().unwrap_or_default());
    Ok(())
}

/// Keyword search over the live index.
pub fn run_search(settings: Settings, query: &str, limit: usize) -> Result<()> {
    let index = open_index(&settings)?;
    let searcher = ArtifactSearcher::new(&index).context("Failed to open searcher")?;
    let hits = searcher.search(query, limit).context("Search failed")?;
    for hit in hits {
        println!("{:.3}  {}", hit.score, hit.uinfo);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_types::RecordKind;
    use tempfile::TempDir;

    fn sample_artifact() -> NewArtifact {
        NewArtifact {
            group_id: "org.slf4j".to_string(),
            artifact_id: "slf4j-api".to_string(),
            version: "2.0.9".to_string(),
            classifier: None,
            extension: "jar".to_string(),
            name: Some("SLF4J API".to_string()),
            description: None,
            last_modified: Some(42),
        }
    }

    #[test]
    fn test_artifact_record() {
        let record = artifact_record(&sample_artifact());
        assert_eq!(record.kind(), RecordKind::Artifact);
        assert_eq!(record.uinfo(), Some("org.slf4j|slf4j-api|2.0.9|NA|jar"));
        assert_eq!(record.last_modified().unwrap(), 42);
        assert_eq!(record.get_str(fields::NAME), Some("SLF4J API"));
        assert!(!record.contains(fields::CLASSIFIER));
    }

    #[test]
    fn test_pack_request_overrides() {
        let overrides = PackOverrides {
            target_dir: Some("/srv/publish".to_string()),
            prefix: Some("central".to_string()),
            max_chunks: Some(3),
            no_incremental: true,
            no_snapshot: true,
            checksums: true,
            use_target_properties: false,
        };
        let request = pack_request(Settings::default(), &overrides).unwrap();
        assert_eq!(request.target_dir, Path::new("/srv/publish"));
        assert_eq!(request.file_prefix, "central");
        assert_eq!(request.max_chunks, 3);
        assert!(!request.create_incremental_chunks);
        assert!(!request.write_full_snapshot);
        assert!(request.create_checksum_files);
    }

    #[test]
    fn test_plan_missing_local() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote.properties");
        std::fs::write(&remote, "chain-id=1\ncounter=2\nchunk-0=2\n").unwrap();

        let files = run_plan(&dir.path().join("local.properties"), &remote, "idx").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_plan_bridgeable() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local.properties");
        let remote = dir.path().join("remote.properties");
        std::fs::write(&local, "chain-id=1\ncounter=1\n").unwrap();
        std::fs::write(&remote, "chain-id=1\ncounter=3\nchunk-0=3\nchunk-1=2\n").unwrap();

        let files = run_plan(&local, &remote, "idx").unwrap();
        assert_eq!(files, vec!["idx.2.gz", "idx.3.gz"]);
    }

    #[test]
    fn test_plan_missing_remote() {
        let dir = TempDir::new().unwrap();
        let result = run_plan(
            &dir.path().join("local.properties"),
            &dir.path().join("remote.properties"),
            "idx",
        );
        assert!(result.is_err());
    }
}

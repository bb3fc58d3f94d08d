//! Context store: read-only disaster/risk records loaded from JSONL files.
//!
//! Every `*.jsonl` file directly inside the data directory is read in file-name
//! order. Each non-blank line must be a JSON object; anything else is skipped
//! with a warning. Records are held in memory and replaced wholesale on reload.

pub mod handlers;
pub mod record;
pub mod search;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use record::ContextRecord;
use search::KnowledgeMatch;

/// Everything read from one pass over the data directory.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<ContextRecord>,
    pub files: BTreeMap<String, usize>,
    pub skipped_lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub data_dir: PathBuf,
    pub files: BTreeMap<String, usize>,
    pub total_records: usize,
    pub skipped_lines: usize,
}

pub struct ContextStore {
    data_dir: PathBuf,
    inner: RwLock<LoadedRecords>,
}

impl ContextStore {
    /// Loads the data directory. A missing directory yields an empty store.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let loaded = read_dir_records(&data_dir)?;
        info!(
            "Context store loaded {} records from {} files in {}",
            loaded.records.len(),
            loaded.files.len(),
            data_dir.display()
        );
        Ok(Self {
            data_dir,
            inner: RwLock::new(loaded),
        })
    }

    /// Re-reads the data directory and swaps the records in one step.
    /// On error the previous records stay in place.
    pub async fn reload(&self) -> Result<StoreStats> {
        let dir = self.data_dir.clone();
        let loaded = tokio::task::spawn_blocking(move || read_dir_records(&dir))
            .await
            .context("Context store reload task panicked")??;
        info!(
            "Context store reloaded: {} records, {} skipped lines",
            loaded.records.len(),
            loaded.skipped_lines
        );
        *self.inner.write().await = loaded;
        Ok(self.stats().await)
    }

    pub async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Vec<KnowledgeMatch> {
        let inner = self.inner.read().await;
        search::rank(&inner.records, query, location, limit)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            data_dir: self.data_dir.clone(),
            files: inner.files.clone(),
            total_records: inner.records.len(),
            skipped_lines: inner.skipped_lines,
        }
    }
}

fn read_dir_records(dir: &Path) -> Result<LoadedRecords> {
    if !dir.is_dir() {
        warn!(
            "Context data directory {} not found, starting with an empty store",
            dir.display()
        );
        return Ok(LoadedRecords::default());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    paths.sort();

    let mut loaded = LoadedRecords::default();
    for path in paths {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let contents =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let (records, skipped) = parse_jsonl(&source, &contents);
        loaded.files.insert(source, records.len());
        loaded.skipped_lines += skipped;
        loaded.records.extend(records);
    }

    Ok(loaded)
}

/// Parses one JSONL document. Returns the records and the number of skipped lines.
///
/// Works on raw bytes so a line that is not valid UTF-8 is skipped on its own
/// instead of failing the whole file.
pub fn parse_jsonl(source: &str, contents: &[u8]) -> (Vec<ContextRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for (idx, line) in contents.split(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(fields)) => records.push(ContextRecord {
                source: source.to_string(),
                line: line_no,
                fields,
            }),
            Ok(_) => {
                warn!("{source}:{line_no}: not a JSON object, skipping");
                skipped += 1;
            }
            Err(e) => {
                warn!("{source}:{line_no}: invalid JSON ({e}), skipping");
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jsonl_skips_blank_malformed_and_non_objects() {
        let doc = "{\"type\": \"flood\"}\n\n   \n{not json}\n[1, 2]\n{\"type\": \"cyclone\"}\n";
        let (records, skipped) = parse_jsonl("a.jsonl", doc.as_bytes());
        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].line, 6);
        assert_eq!(records[1].fields["type"], "cyclone");
    }

    #[test]
    fn test_parse_jsonl_handles_crlf() {
        let doc = b"{\"type\": \"flood\"}\r\n{\"type\": \"cyclone\"}\r\n";
        let (records, skipped) = parse_jsonl("a.jsonl", doc);
        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = b"{\"hazard\": \"flood\", \"region\": \"Assam\"}\n".to_vec();
        contents.extend_from_slice(b"{\"hazard\": \"\xff\xfe\"}\n");
        contents.extend_from_slice(b"{\"hazard\": \"cyclone\"}\n");
        std::fs::write(dir.path().join("a.jsonl"), contents).unwrap();

        let store = ContextStore::load(dir.path()).unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.skipped_lines, 1);

        let matches = store.search("cyclone", None, 5).await;
        assert_eq!(matches[0].line, 3);
        assert!(store.reload().await.is_ok());
    }

    #[tokio::test]
    async fn test_load_reads_only_jsonl_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jsonl"), "{\"hazard\": \"heatwave\"}\n").unwrap();
        std::fs::write(dir.path().join("a.jsonl"), "{\"hazard\": \"heatwave\"}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "{\"hazard\": \"heatwave\"}\n").unwrap();

        let store = ContextStore::load(dir.path()).unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.files.keys().collect::<Vec<_>>(), vec!["a.jsonl", "b.jsonl"]);

        let matches = store.search("heatwave", None, 5).await;
        assert_eq!(matches[0].source, "a.jsonl");
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::load(dir.path().join("absent")).unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::load(dir.path()).unwrap();
        assert_eq!(store.len().await, 0);

        std::fs::write(
            dir.path().join("landslides.jsonl"),
            "{\"hazard\": \"landslide\", \"region\": \"Kerala\"}\n{broken\n",
        )
        .unwrap();

        let stats = store.reload().await.unwrap();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.skipped_lines, 1);
        assert_eq!(store.search("landslide", Some("Kerala"), 5).await.len(), 1);
    }
}

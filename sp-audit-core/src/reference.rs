//! Reference store.
//!
//! Canonical comparison data captured from a trusted backend. Written only by
//! the explicit capture action; read by the virtual `reference` backend.
//!
//! On disk, each block is one JSON document:
//!
//! ```text
//! <root>/<network>/block_<height>.json
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::network::Network;
use crate::record::{TweakRecord, TweakSet};

/// Storage of canonical tweak sets keyed by network and height.
///
/// Methods are synchronous and may block on file I/O. Async callers run them
/// on the blocking pool.
pub trait ReferenceStore: Send + Sync {
    /// Stored set for a height, `None` when nothing was captured.
    fn load(&self, network: Network, height: u64) -> Result<Option<TweakSet>>;

    /// Store (overwrite) the set for a height. `source` names the backend the
    /// data was captured from.
    fn store(&self, network: Network, height: u64, source: &str, tweaks: &TweakSet) -> Result<()>;

    /// Stored heights within `[start, end]`, ascending.
    fn heights(&self, network: Network, start: u64, end: u64) -> Result<Vec<u64>>;
}

/// Document written per block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub network: Network,
    pub block_height: u64,
    pub source: String,
    pub captured_at: DateTime<Utc>,
    pub tweaks: Vec<TweakRecord>,
}

/// File-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileReferenceStore {
    root: PathBuf,
}

impl FileReferenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn network_dir(&self, network: Network) -> PathBuf {
        self.root.join(network.as_str())
    }

    fn block_path(&self, network: Network, height: u64) -> PathBuf {
        self.network_dir(network).join(format!("block_{}.json", height))
    }

    /// Read the full document, including capture metadata.
    pub fn load_document(&self, network: Network, height: u64) -> Result<Option<ReferenceDocument>> {
        let path = self.block_path(network, height);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            AuditError::ReferenceStore(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let doc: ReferenceDocument = serde_json::from_str(&content).map_err(|e| {
            AuditError::ReferenceStore(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if doc.block_height != height {
            return Err(AuditError::ReferenceStore(format!(
                "{} holds block {} instead of {}",
                path.display(),
                doc.block_height,
                height
            )));
        }

        Ok(Some(doc))
    }
}

impl ReferenceStore for FileReferenceStore {
    fn load(&self, network: Network, height: u64) -> Result<Option<TweakSet>> {
        let Some(doc) = self.load_document(network, height)? else {
            return Ok(None);
        };

        let tweaks = doc
            .tweaks
            .iter()
            .map(TweakRecord::normalized)
            .collect::<Result<TweakSet>>()?;
        Ok(Some(tweaks))
    }

    fn store(&self, network: Network, height: u64, source: &str, tweaks: &TweakSet) -> Result<()> {
        let dir = self.network_dir(network);
        fs::create_dir_all(&dir).map_err(|e| {
            AuditError::ReferenceStore(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let doc = ReferenceDocument {
            network,
            block_height: height,
            source: source.to_string(),
            captured_at: Utc::now(),
            tweaks: tweaks.iter().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&doc)
            .map_err(|e| AuditError::ReferenceStore(format!("Failed to serialize block {}: {}", height, e)))?;

        // Temp file + rename: the document is replaced atomically.
        let path = self.block_path(network, height);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| {
            AuditError::ReferenceStore(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            AuditError::ReferenceStore(format!("Failed to replace {}: {}", path.display(), e))
        })
    }

    fn heights(&self, network: Network, start: u64, end: u64) -> Result<Vec<u64>> {
        let dir = self.network_dir(network);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| {
            AuditError::ReferenceStore(format!("Failed to list {}: {}", dir.display(), e))
        })?;

        let mut heights: Vec<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_prefix("block_")?
                    .strip_suffix(".json")?
                    .parse::<u64>()
                    .ok()
            })
            .filter(|h| (start..=end).contains(h))
            .collect();
        heights.sort_unstable();
        Ok(heights)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryReferenceStore {
    blocks: RwLock<HashMap<(Network, u64), TweakSet>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AuditError {
    AuditError::ReferenceStore("reference store lock poisoned".to_string())
}

impl ReferenceStore for MemoryReferenceStore {
    fn load(&self, network: Network, height: u64) -> Result<Option<TweakSet>> {
        let blocks = self.blocks.read().map_err(poisoned)?;
        Ok(blocks.get(&(network, height)).cloned())
    }

    fn store(&self, network: Network, height: u64, _source: &str, tweaks: &TweakSet) -> Result<()> {
        let mut blocks = self.blocks.write().map_err(poisoned)?;
        blocks.insert((network, height), tweaks.clone());
        Ok(())
    }

    fn heights(&self, network: Network, start: u64, end: u64) -> Result<Vec<u64>> {
        let blocks = self.blocks.read().map_err(poisoned)?;
        let mut heights: Vec<u64> = blocks
            .keys()
            .filter(|(n, h)| *n == network && (start..=end).contains(h))
            .map(|(_, h)| *h)
            .collect();
        heights.sort_unstable();
        Ok(heights)
    }
}

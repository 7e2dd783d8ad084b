//! On-disk save slots.
//!
//! Each slot is two files under the store directory: `<slot>.sav` holding the
//! encoded state and `<slot>.json` holding [`SaveMetadata`]. Slot names are
//! percent-encoded so any string is a safe file name. Writes go through a
//! temp file and a rename while holding an exclusive lock, so a reader never
//! sees a half-written blob.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{info, warn};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{StateError, TameError};
use crate::module::hex;

use super::ModuleContext;

const STATE_EXT: &str = "sav";
const META_EXT: &str = "json";
const LOCK_FILE: &str = ".lock";

/// Sidecar describing one save slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub slot: String,
    /// Title header of the module that produced the save.
    pub title: String,
    /// Module digest, hex encoded.
    pub module_digest: String,
    /// SHA-256 of the state blob, hex encoded.
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Directory of save slots.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

fn slot_file_stem(slot: &str) -> String {
    utf8_percent_encode(slot, NON_ALPHANUMERIC).to_string()
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("slot");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content)?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
            }
            Err(e) => return Err(e),
        }
    };
    fs::rename(&tmp_path, path)?;
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    Ok(())
}

impl SaveStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, slot: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", slot_file_stem(slot), STATE_EXT))
    }

    fn meta_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", slot_file_stem(slot), META_EXT))
    }

    fn lock(&self) -> Result<File, StateError> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    /// Encode `ctx` into `slot`, replacing any previous save there.
    pub fn save(&self, slot: &str, ctx: &ModuleContext) -> Result<SaveMetadata, StateError> {
        let bytes = ctx.save_state()?;
        let module = ctx.module();
        let metadata = SaveMetadata {
            slot: slot.to_string(),
            title: module.title().to_string(),
            module_digest: module.digest_hex(),
            checksum: checksum(&bytes),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec_pretty(&metadata)?;

        let lock = self.lock()?;
        write_atomic(&self.dir, &self.state_path(slot), &bytes)?;
        write_atomic(&self.dir, &self.meta_path(slot), &meta_json)?;
        drop(lock);

        info!("saved slot '{}' ({} bytes)", slot, bytes.len());
        Ok(metadata)
    }

    /// Verify and restore `slot` into `ctx`. The context is unchanged on error.
    pub fn load(&self, slot: &str, ctx: &mut ModuleContext) -> Result<SaveMetadata, TameError> {
        let lock = self.lock()?;
        let metadata = self.read_metadata(slot)?;
        let bytes = fs::read(self.state_path(slot)).map_err(StateError::from)?;
        drop(lock);

        if checksum(&bytes) != metadata.checksum {
            warn!("checksum mismatch for slot '{}'", slot);
            return Err(StateError::Checksum(slot.to_string()).into());
        }
        ctx.load_state(&bytes)?;
        info!("loaded slot '{}' saved at {}", slot, metadata.created_at);
        Ok(metadata)
    }

    pub fn metadata(&self, slot: &str) -> Result<SaveMetadata, StateError> {
        self.read_metadata(slot)
    }

    fn read_metadata(&self, slot: &str) -> Result<SaveMetadata, StateError> {
        let path = self.meta_path(slot);
        if !path.exists() {
            return Err(StateError::NotFound(slot.to_string()));
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn exists(&self, slot: &str) -> bool {
        self.meta_path(slot).exists() && self.state_path(slot).exists()
    }

    /// Remove a slot. Returns whether anything was deleted.
    pub fn delete(&self, slot: &str) -> Result<bool, StateError> {
        let lock = self.lock()?;
        let mut removed = false;
        for path in [self.state_path(slot), self.meta_path(slot)] {
            if path.exists() {
                fs::remove_file(path)?;
                removed = true;
            }
        }
        drop(lock);
        Ok(removed)
    }

    /// Metadata of every slot, sorted by slot name. Unreadable sidecars are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<SaveMetadata>, StateError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let slot = percent_decode_str(stem).decode_utf8_lossy().to_string();
            match self.read_metadata(&slot) {
                Ok(meta) => out.push(meta),
                Err(e) => warn!("skipping unreadable save metadata {}: {}", path.display(), e),
            }
        }
        out.sort_by(|a, b| a.slot.cmp(&b.slot));
        Ok(out)
    }
}

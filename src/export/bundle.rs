//! Atomic, versioned bundle writer
//!
//! A bundle is one directory per run under a destination:
//!
//! ```text
//! destination/
//!   LATEST                      run id of the newest published bundle
//!   20240101T000000Z-1a2b3c4d/
//!     model.bin                 bincode Tagged<ModelArtifact>
//!     scaler.json               JSON Tagged<ScalerState>
//!     feature_names.json        JSON Tagged<FeatureNames>
//!     metadata.json             JSON Tagged<RunMetadata>
//!     manifest.json             checksums, written last
//! ```
//!
//! Units are written into `.staging-<run_id>` and the directory is renamed
//! into place only after every file, manifest included, is on disk.
//! A reader therefore sees either a complete bundle or none. `LATEST` moves
//! in a separate step, [`publish_latest`], so a committed bundle can be
//! checked before anything that follows `LATEST` picks it up.

use super::artifact::{ModelArtifact, RunId, RunMetadata};
use crate::dataset::FeatureNames;
use crate::error::{PipelineError, Result};
use crate::preprocessing::ScalerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bundle layout version understood by this crate
pub const FORMAT_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "model.bin";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const LATEST_FILE: &str = "LATEST";
pub const STAGING_PREFIX: &str = ".staging-";

/// A persisted unit labelled with the run that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tagged<T> {
    pub run_id: RunId,
    pub payload: T,
}

/// Checksum record for one bundle file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Completion marker and integrity record of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|e| e.name == name)
    }
}

/// Location of a committed bundle
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub run_id: RunId,
    pub path: PathBuf,
    pub manifest: Manifest,
}

/// Hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Bundle being written. Dropping it without [`commit`](Self::commit)
/// removes the staging directory.
#[derive(Debug)]
pub struct StagedBundle {
    run_id: RunId,
    destination: PathBuf,
    staging: PathBuf,
    entries: Vec<ManifestEntry>,
    committed: bool,
}

impl StagedBundle {
    /// Create an empty staging directory for `run_id` under `destination`
    pub fn create(destination: impl AsRef<Path>, run_id: RunId) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        fs::create_dir_all(&destination)?;

        if destination.join(run_id.as_str()).exists() {
            return Err(PipelineError::ArtifactError(format!(
                "bundle already exists: {}",
                destination.join(run_id.as_str()).display()
            )));
        }

        let staging = destination.join(format!("{}{}", STAGING_PREFIX, run_id));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;
        debug!(path = %staging.display(), "Created staging directory");

        Ok(Self {
            run_id,
            destination,
            staging,
            entries: Vec::new(),
            committed: false,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Write `Tagged<T>` as pretty JSON
    pub fn write_json<T: Serialize>(&mut self, name: &str, payload: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.tag(payload))?;
        self.write_file(name, &bytes)
    }

    /// Write `Tagged<T>` as bincode
    pub fn write_bincode<T: Serialize>(&mut self, name: &str, payload: &T) -> Result<()> {
        let bytes = bincode::serialize(&self.tag(payload))?;
        self.write_file(name, &bytes)
    }

    fn tag<'a, T>(&self, payload: &'a T) -> Tagged<&'a T> {
        Tagged {
            run_id: self.run_id.clone(),
            payload,
        }
    }

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if name == MANIFEST_FILE || self.entries.iter().any(|e| e.name == name) {
            return Err(PipelineError::ArtifactError(format!(
                "file already staged or reserved: {}",
                name
            )));
        }
        write_synced(&self.staging.join(name), bytes)?;
        self.entries.push(ManifestEntry {
            name: name.to_string(),
            sha256: sha256_hex(bytes),
            size_bytes: bytes.len() as u64,
        });
        Ok(())
    }

    /// Write the manifest and move the bundle into place. `LATEST` is left
    /// untouched.
    pub fn commit(mut self) -> Result<ArtifactHandle> {
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            run_id: self.run_id.clone(),
            created_at: Utc::now(),
            files: self.entries.clone(),
        };
        write_synced(
            &self.staging.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;
        sync_dir(&self.staging)?;

        let final_path = self.destination.join(self.run_id.as_str());
        fs::rename(&self.staging, &final_path)?;
        self.committed = true;
        sync_dir(&self.destination)?;

        info!(
            run_id = %self.run_id,
            path = %final_path.display(),
            files = manifest.files.len(),
            "Committed bundle"
        );

        Ok(ArtifactHandle {
            run_id: self.run_id.clone(),
            path: final_path,
            manifest,
        })
    }
}

impl Drop for StagedBundle {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        warn!(run_id = %self.run_id, "Discarding uncommitted bundle");
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            warn!(path = %self.staging.display(), error = %e, "Failed to remove staging directory");
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Point `destination/LATEST` at a committed bundle (write-to-temp, then rename)
pub fn publish_latest(destination: impl AsRef<Path>, handle: &ArtifactHandle) -> Result<()> {
    let destination = destination.as_ref();
    if handle.path != destination.join(handle.run_id.as_str()) {
        return Err(PipelineError::ArtifactError(format!(
            "bundle {} is not under {}",
            handle.path.display(),
            destination.display()
        )));
    }
    if !handle.path.join(MANIFEST_FILE).is_file() {
        return Err(PipelineError::ArtifactError(format!(
            "cannot publish {}: no manifest",
            handle.path.display()
        )));
    }

    let tmp = destination.join(format!(".{}.tmp-{}", LATEST_FILE, handle.run_id));
    write_synced(&tmp, handle.run_id.as_str().as_bytes())?;
    fs::rename(&tmp, destination.join(LATEST_FILE))?;
    sync_dir(destination)?;
    info!(run_id = %handle.run_id, "Published bundle as LATEST");
    Ok(())
}

/// Remove a committed bundle that must never be served
pub fn discard(handle: &ArtifactHandle) -> Result<()> {
    fs::remove_dir_all(&handle.path)?;
    warn!(run_id = %handle.run_id, path = %handle.path.display(), "Discarded bundle");
    Ok(())
}

/// Persist all units of a run as one atomically committed bundle.
///
/// The bundle is not published; call [`publish_latest`] once it is accepted.
pub fn persist(
    model: &ModelArtifact,
    scaler: &ScalerState,
    feature_names: &FeatureNames,
    metadata: &RunMetadata,
    destination: impl AsRef<Path>,
) -> Result<ArtifactHandle> {
    if model.feature_names() != feature_names {
        return Err(PipelineError::FeatureMismatch(
            "model and feature name list disagree".to_string(),
        ));
    }
    if feature_names.as_slice().get(scaler.column_index()).map(String::as_str) != Some(scaler.column()) {
        return Err(PipelineError::FeatureMismatch(format!(
            "scaler column {} is not at position {}",
            scaler.column(),
            scaler.column_index()
        )));
    }

    let mut staged = StagedBundle::create(destination, metadata.run_id().clone())?;
    staged.write_bincode(MODEL_FILE, model)?;
    staged.write_json(SCALER_FILE, scaler)?;
    staged.write_json(FEATURE_NAMES_FILE, feature_names)?;
    staged.write_json(METADATA_FILE, metadata)?;
    staged.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run_id() -> RunId {
        RunId::parse("20240101T000000Z-0badcafe").unwrap()
    }

    #[test]
    fn test_commit_moves_bundle_then_publish_updates_latest() {
        let dir = tempdir().unwrap();
        let mut staged = StagedBundle::create(dir.path(), run_id()).unwrap();
        staged.write_json("a.json", &vec![1, 2, 3]).unwrap();
        let staging = staged.staging_path().to_path_buf();

        let handle = staged.commit().unwrap();
        assert!(!staging.exists());
        assert!(handle.path.join("a.json").exists());
        assert!(handle.path.join(MANIFEST_FILE).exists());
        assert!(!dir.path().join(LATEST_FILE).exists());

        publish_latest(dir.path(), &handle).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(LATEST_FILE)).unwrap(),
            run_id().as_str()
        );

        let entry = handle.manifest.entry("a.json").unwrap();
        let bytes = fs::read(handle.path.join("a.json")).unwrap();
        assert_eq!(entry.sha256, sha256_hex(&bytes));
        assert_eq!(entry.size_bytes, bytes.len() as u64);

        let tagged: Tagged<Vec<i32>> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(tagged.run_id, run_id());
        assert_eq!(tagged.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_without_commit_cleans_up() {
        let dir = tempdir().unwrap();
        let staging = {
            let mut staged = StagedBundle::create(dir.path(), run_id()).unwrap();
            staged.write_json("a.json", &1).unwrap();
            staged.staging_path().to_path_buf()
        };
        assert!(!staging.exists());
        assert!(!dir.path().join(run_id().as_str()).exists());
        assert!(!dir.path().join(LATEST_FILE).exists());
    }

    #[test]
    fn test_existing_bundle_is_not_overwritten() {
        let dir = tempdir().unwrap();
        StagedBundle::create(dir.path(), run_id()).unwrap().commit().unwrap();
        assert!(matches!(
            StagedBundle::create(dir.path(), run_id()),
            Err(PipelineError::ArtifactError(_))
        ));
    }

    #[test]
    fn test_publish_rejects_foreign_destination() {
        let dir = tempdir().unwrap();
        let other = tempdir().unwrap();
        let handle = StagedBundle::create(dir.path(), run_id()).unwrap().commit().unwrap();

        assert!(publish_latest(other.path(), &handle).is_err());
        assert!(!other.path().join(LATEST_FILE).exists());
    }

    #[test]
    fn test_discard_removes_committed_bundle() {
        let dir = tempdir().unwrap();
        let handle = StagedBundle::create(dir.path(), run_id()).unwrap().commit().unwrap();
        discard(&handle).unwrap();

        assert!(!handle.path.exists());
        assert!(publish_latest(dir.path(), &handle).is_err());
        assert!(!dir.path().join(LATEST_FILE).exists());
    }

    #[test]
    fn test_manifest_name_is_reserved() {
        let dir = tempdir().unwrap();
        let mut staged = StagedBundle::create(dir.path(), run_id()).unwrap();
        assert!(staged.write_json(MANIFEST_FILE, &1).is_err());
        staged.write_json("a.json", &1).unwrap();
        assert!(staged.write_json("a.json", &2).is_err());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}

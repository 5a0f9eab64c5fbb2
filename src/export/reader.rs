//! Verified bundle loading

use super::artifact::{ModelArtifact, RunId, RunMetadata};
use super::bundle::{
    sha256_hex, Manifest, Tagged, FEATURE_NAMES_FILE, FORMAT_VERSION, LATEST_FILE, MANIFEST_FILE,
    METADATA_FILE, MODEL_FILE, SCALER_FILE, STAGING_PREFIX,
};
use crate::dataset::FeatureNames;
use crate::error::{PipelineError, Result};
use crate::preprocessing::ScalerState;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every unit of a committed bundle, checked against its manifest
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub model: ModelArtifact,
    pub scaler: ScalerState,
    pub feature_names: FeatureNames,
    pub metadata: RunMetadata,
}

/// Resolve the bundle named by `destination/LATEST`
pub fn resolve_latest(destination: impl AsRef<Path>) -> Result<PathBuf> {
    let destination = destination.as_ref();
    let latest = destination.join(LATEST_FILE);
    let contents = fs::read_to_string(&latest).map_err(|e| {
        PipelineError::ArtifactError(format!("cannot read {}: {}", latest.display(), e))
    })?;
    let run_id = RunId::parse(contents.trim())?;
    Ok(destination.join(run_id.as_str()))
}

/// Accept either a bundle directory or a destination holding `LATEST`
pub fn resolve_bundle(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.join(LATEST_FILE).is_file() && !path.join(MANIFEST_FILE).exists() {
        resolve_latest(path)
    } else {
        Ok(path.to_path_buf())
    }
}

/// Load and verify a bundle directory.
///
/// Fails on staging directories, a missing manifest, an unknown format
/// version, any size or checksum mismatch, and units tagged with a run id
/// other than the manifest's.
pub fn load_bundle(dir: impl AsRef<Path>) -> Result<LoadedBundle> {
    let dir = dir.as_ref();
    let dir_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::ArtifactError(format!("not a bundle path: {}", dir.display())))?;

    if dir_name.starts_with(STAGING_PREFIX) {
        return Err(PipelineError::ArtifactError(format!(
            "{} is an uncommitted staging directory",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(PipelineError::ArtifactError(format!(
            "bundle not found: {}",
            dir.display()
        )));
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(PipelineError::ArtifactError(format!(
            "{} has no manifest; the bundle is incomplete",
            dir.display()
        )));
    }
    let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(PipelineError::ArtifactError(format!(
            "unsupported bundle format version {} (expected {})",
            manifest.format_version, FORMAT_VERSION
        )));
    }
    if manifest.run_id.as_str() != dir_name {
        return Err(PipelineError::ArtifactError(format!(
            "manifest run id {} does not match directory {}",
            manifest.run_id, dir_name
        )));
    }

    let reader = UnitReader {
        dir,
        manifest: &manifest,
    };
    let model: ModelArtifact = reader.read(MODEL_FILE, |b| Ok(bincode::deserialize(b)?))?;
    let scaler: ScalerState = reader.read(SCALER_FILE, |b| Ok(serde_json::from_slice(b)?))?;
    let feature_names: FeatureNames =
        reader.read(FEATURE_NAMES_FILE, |b| Ok(serde_json::from_slice(b)?))?;
    let metadata: RunMetadata = reader.read(METADATA_FILE, |b| Ok(serde_json::from_slice(b)?))?;

    if model.feature_names() != &feature_names {
        return Err(PipelineError::ArtifactError(
            "model feature order differs from feature_names.json".to_string(),
        ));
    }
    if feature_names.as_slice().get(scaler.column_index()).map(String::as_str) != Some(scaler.column())
    {
        return Err(PipelineError::ArtifactError(format!(
            "scaler column {} is not at position {}",
            scaler.column(),
            scaler.column_index()
        )));
    }
    if metadata.run_id() != &manifest.run_id {
        return Err(PipelineError::ArtifactError(
            "metadata run id differs from manifest".to_string(),
        ));
    }

    debug!(run_id = %manifest.run_id, path = %dir.display(), "Loaded bundle");

    Ok(LoadedBundle {
        path: dir.to_path_buf(),
        manifest,
        model,
        scaler,
        feature_names,
        metadata,
    })
}

struct UnitReader<'a> {
    dir: &'a Path,
    manifest: &'a Manifest,
}

impl UnitReader<'_> {
    fn read<T: DeserializeOwned>(
        &self,
        name: &str,
        decode: impl Fn(&[u8]) -> Result<Tagged<T>>,
    ) -> Result<T> {
        let entry = self.manifest.entry(name).ok_or_else(|| {
            PipelineError::ArtifactError(format!("manifest does not list {}", name))
        })?;

        let bytes = fs::read(self.dir.join(name))?;
        if bytes.len() as u64 != entry.size_bytes {
            return Err(PipelineError::ArtifactError(format!(
                "{}: size {} does not match manifest {}",
                name,
                bytes.len(),
                entry.size_bytes
            )));
        }
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(PipelineError::ArtifactError(format!(
                "{}: checksum mismatch",
                name
            )));
        }

        let tagged = decode(&bytes)?;
        if tagged.run_id != self.manifest.run_id {
            return Err(PipelineError::ArtifactError(format!(
                "{} belongs to run {}, not {}",
                name, tagged.run_id, self.manifest.run_id
            )));
        }
        Ok(tagged.payload)
    }
}

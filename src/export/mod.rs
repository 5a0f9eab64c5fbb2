//! Model export module
//!
//! Persists a training run as a self-describing bundle directory:
//! - Bincode model artifact with its feature order
//! - JSON scaler state, feature names and run metadata
//! - A checksummed manifest marking the bundle complete

mod artifact;
mod bundle;
mod reader;

pub use artifact::{FeatureImportance, ModelArtifact, RunId, RunMetadata};
pub use bundle::{
    discard, persist, publish_latest, sha256_hex, ArtifactHandle, Manifest, ManifestEntry, StagedBundle, Tagged,
    FEATURE_NAMES_FILE, FORMAT_VERSION, LATEST_FILE, MANIFEST_FILE, METADATA_FILE, MODEL_FILE,
    SCALER_FILE, STAGING_PREFIX,
};
pub use reader::{load_bundle, resolve_bundle, resolve_latest, LoadedBundle};

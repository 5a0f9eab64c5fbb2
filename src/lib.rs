//! Fraud Pipeline - card transaction fraud detection, offline
//!
//! Validates a labelled transaction dataset, splits it with stratification,
//! scales `Amount`, trains a class-weighted random forest, evaluates it on the
//! held-out rows and writes an atomic, versioned model bundle that a
//! [`Predictor`](inference::Predictor) can load and score with.
//!
//! # Modules
//!
//! ## Data
//! - [`dataset`] - Schema, feature names, labelled matrices, summaries
//! - [`validation`] - Existence, schema, quality, range and distribution checks
//! - [`preprocessing`] - Stratified split and `Amount` scaling
//!
//! ## Model
//! - [`training`] - Decision trees and the random forest
//! - [`evaluation`] - Confusion matrix, precision, recall, F1
//!
//! ## Artifacts
//! - [`export`] - Bundle writer and reader
//! - [`inference`] - Load a bundle and score transactions
//!
//! ## Orchestration
//! - [`pipeline`] - Stage driver and run report
//! - [`config`] - Pipeline settings
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod dataset;
pub mod preprocessing;
pub mod validation;

// Model
pub mod evaluation;
pub mod training;

// Artifacts
pub mod export;
pub mod inference;

// Orchestration
pub mod cli;
pub mod config;
pub mod pipeline;

// Utilities
pub mod utils;

pub use error::{PipelineError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::dataset::{ClassCounts, Dataset, FeatureMap, FeatureNames};
    pub use crate::error::{PipelineError, Result};
    pub use crate::evaluation::{evaluate, ConfusionMatrix, Metrics};
    pub use crate::export::{load_bundle, persist, ArtifactHandle, RunId, RunMetadata};
    pub use crate::inference::Predictor;
    pub use crate::pipeline::{RunReport, Stage, TrainingPipeline};
    pub use crate::preprocessing::{stratified_split, AmountScaler, SplitConfig};
    pub use crate::training::{Classifier, RandomForest, TrainingConfig};
    pub use crate::validation::{validate, ValidationPolicy, ValidationReport};
}

//! Data preprocessing module
//!
//! - Stratified, seeded train/test split
//! - Standard scaling of the `Amount` column, fitted on training rows only

pub mod scaler;
pub mod split;

pub use scaler::{AmountScaler, ScalerState};
pub use split::{stratified_split, SplitConfig, TestPartition, TrainPartition};

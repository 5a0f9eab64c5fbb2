//! End-to-end training pipeline
//!
//! Runs validate → split → scale → train → evaluate → persist → verify,
//! recording each stage in a [`RunReport`]. A dataset with any validation
//! error stops the run before the split; warnings are carried into the
//! run metadata. `LATEST` moves only after the reloaded bundle passes the
//! verify stage; a bundle that fails it is removed.

mod report;

pub use report::{RunReport, SampleCheck, Stage, StageRecord, StageStatus};

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::evaluation::evaluate;
use crate::export::{
    discard, persist, publish_latest, ArtifactHandle, ModelArtifact, RunId, RunMetadata,
};
use crate::inference::Predictor;
use crate::preprocessing::{stratified_split, AmountScaler, TestPartition};
use crate::training::{self, label_for, RandomForest};
use crate::utils::Timer;
use crate::validation;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Reloaded and in-memory scores may differ by at most this much
const RELOAD_TOLERANCE: f64 = 1e-12;

/// Trains and persists a fraud model from a dataset file
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
    destination: PathBuf,
}

impl TrainingPipeline {
    /// Pipeline writing bundles under `destination`
    pub fn new(config: PipelineConfig, destination: impl Into<PathBuf>) -> Self {
        Self {
            config,
            destination: destination.into(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Run every stage, returning the report of a successful run
    pub fn run(&self, source: &Path) -> Result<RunReport> {
        let (report, outcome) = self.run_recorded(source);
        outcome.map(|_| report)
    }

    /// Run every stage and always hand back the report, even on failure
    pub fn run_recorded(&self, source: &Path) -> (RunReport, Result<ArtifactHandle>) {
        let mut report = RunReport::new(source);
        let outcome = self.execute(source, &mut report);
        match &outcome {
            Ok(handle) => info!(
                run_id = %handle.run_id,
                path = %handle.path.display(),
                elapsed_ms = report.total_elapsed_ms(),
                "Pipeline finished"
            ),
            Err(e) => error!(error = %e, "Pipeline failed"),
        }
        (report, outcome)
    }

    fn execute(&self, source: &Path, report: &mut RunReport) -> Result<ArtifactHandle> {
        self.config.check()?;
        let config = &self.config;

        let inspection = match run_stage(report, Stage::Validate, || {
            let inspection = validation::inspect(source, &config.validation);
            if !inspection.report.is_valid() {
                return Err(PipelineError::ValidationFailed(Box::new(inspection.report)));
            }
            let detail = format!(
                "{} rows, {} warning(s)",
                inspection.report.n_rows(),
                inspection.report.warnings().len()
            );
            Ok((inspection, detail))
        }) {
            Ok(inspection) => inspection,
            Err(PipelineError::ValidationFailed(findings)) => {
                report.set_validation((*findings).clone());
                return Err(PipelineError::ValidationFailed(findings));
            }
            Err(e) => return Err(e),
        };
        let warnings = inspection.report.warning_messages();
        report.set_validation(inspection.report);
        let table = inspection
            .table
            .ok_or_else(|| PipelineError::DataError("validated source has no table".to_string()))?;

        let (train, test) = run_stage(report, Stage::Split, || {
            let dataset = Dataset::from_frame(&table)?;
            let (train, test) = stratified_split(&dataset, config.split.test_fraction, config.split.seed)?;
            let detail = format!(
                "train {} ({} fraud), test {} ({} fraud)",
                train.n_samples(),
                train.class_counts().fraud,
                test.n_samples(),
                test.class_counts().fraud
            );
            Ok(((train, test), detail))
        })?;
        drop(table);

        let (scaler, x_train, x_test) = run_stage(report, Stage::Scale, || {
            let scaler = AmountScaler::fit(&train)?;
            let x_train = scaler.apply(train.data().features())?;
            let x_test = scaler.apply(test.data().features())?;
            let detail = format!(
                "{}: mean {:.4}, scale {:.4}",
                scaler.column(),
                scaler.mean(),
                scaler.scale()
            );
            Ok(((scaler, x_train, x_test), detail))
        })?;

        let train_timer = Timer::start();
        let forest = run_stage(report, Stage::Train, || {
            let forest = training::train(&x_train, train.data().labels(), &config.training)?;
            let detail = format!("{} trees", forest.n_trees());
            Ok((forest, detail))
        })?;
        let training_time_ms = train_timer.elapsed_ms();

        let metrics = run_stage(report, Stage::Evaluate, || {
            let metrics = evaluate(&forest, &x_test, test.data().labels())?;
            Ok((metrics, metrics.to_string()))
        })?;
        report.set_metrics(metrics);

        let feature_names = train.data().feature_names().clone();
        let handle = run_stage(report, Stage::Persist, || {
            let importances = forest
                .feature_importances()
                .ok_or(PipelineError::ModelNotFitted)?
                .clone();
            let metadata = RunMetadata::new(
                RunId::generate(),
                &config.training,
                &config.split,
                train.class_counts(),
                test.class_counts(),
                metrics,
            )
            .with_feature_importances(&feature_names, &importances)?
            .with_validation_warnings(warnings)
            .with_training_time_ms(training_time_ms);

            let artifact = ModelArtifact::new(feature_names.clone(), forest.clone())?;
            let handle = persist(&artifact, &scaler, &feature_names, &metadata, &self.destination)?;
            let detail = format!("{} -> {}", handle.run_id, handle.path.display());
            Ok((handle, detail))
        })?;

        let checks = run_stage(report, Stage::Verify, || {
            let checks = publish_verified(&self.destination, &handle, |bundle| {
                verify_bundle(bundle, &forest, &test, &x_test)
            })?;
            let correct = checks.iter().filter(|c| c.is_correct()).count();
            let detail = format!("{}/{} sample rows classified correctly", correct, checks.len());
            Ok((checks, detail))
        })?;
        for check in checks {
            report.push_sample_check(check);
        }
        report.set_bundle(handle.run_id.clone(), handle.path.clone());

        Ok(handle)
    }
}

/// Time a stage, log its outcome and append it to the report
fn run_stage<T>(
    report: &mut RunReport,
    stage: Stage,
    body: impl FnOnce() -> Result<(T, String)>,
) -> Result<T> {
    let timer = Timer::start();
    let outcome = body();
    let elapsed_ms = timer.elapsed_ms();

    match outcome {
        Ok((value, detail)) => {
            info!(%stage, elapsed_ms, %detail, "Stage complete");
            report.record(StageRecord {
                stage,
                status: StageStatus::Succeeded,
                elapsed_ms,
                detail,
            });
            Ok(value)
        }
        Err(e) => {
            error!(%stage, elapsed_ms, error = %e, "Stage failed");
            report.record(StageRecord {
                stage,
                status: StageStatus::Failed,
                elapsed_ms,
                detail: e.to_string(),
            });
            Err(e)
        }
    }
}

/// Publish a committed bundle as `LATEST` only if `verify` accepts it.
/// A rejected bundle is removed and `LATEST` keeps its previous target.
fn publish_verified<T>(
    destination: &Path,
    handle: &ArtifactHandle,
    verify: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    match verify(&handle.path) {
        Ok(value) => {
            publish_latest(destination, handle)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(cleanup) = discard(handle) {
                error!(run_id = %handle.run_id, error = %cleanup, "Failed to remove rejected bundle");
            }
            Err(e)
        }
    }
}

/// Reload the committed bundle and score the first fraud and first normal
/// held-out rows from their raw features.
///
/// The reloaded score must match the in-memory forest on the same row, so
/// a bundle that scales or orders features differently is caught here.
fn verify_bundle(
    bundle: &Path,
    forest: &RandomForest,
    test: &TestPartition,
    x_test_scaled: &Array2<f64>,
) -> Result<Vec<SampleCheck>> {
    let predictor = Predictor::load(bundle)?;
    let labels = test.data().labels();
    let raw = test.data().features();

    let mut checks = Vec::with_capacity(2);
    for want_fraud in [true, false] {
        let Some(i) = labels.iter().position(|&y| (y > 0.5) == want_fraud) else {
            continue;
        };

        let score = predictor.predict_ordered(&raw.row(i).to_vec())?;
        let expected = forest.predict_proba_row(x_test_scaled.row(i))?;
        if (score - expected).abs() > RELOAD_TOLERANCE {
            return Err(PipelineError::ArtifactError(format!(
                "reloaded model scored row {} as {} but the trained model gave {}",
                test.rows()[i],
                score,
                expected
            )));
        }

        let check = SampleCheck {
            source_row: test.rows()[i],
            actual_fraud: want_fraud,
            score,
            predicted_fraud: label_for(score) == 1.0,
        };
        info!(
            source_row = check.source_row,
            actual_fraud = check.actual_fraud,
            score = check.score,
            correct = check.is_correct(),
            "Sample prediction"
        );
        checks.push(check);
    }
    Ok(checks)
}

//! Epoch driver shared by every model.
//!
//! The driver knows nothing about individual models: it only speaks the
//! [`ScoringModel`] protocol.
//!
//! ```text
//! for epoch in 0..epochs:
//!     model.begin_epoch()
//!     for t in triplets:  model.train_on_triplet(t, sampler)
//!     model.end_epoch(epoch == epochs - 1)
//! ```
//!
//! A failing step aborts the whole run; nothing is retried.
//!
//! # Example
//!
//! ```rust
//! use lattix_latent::{
//!     CorruptingSampler, GraphShape, Trainer, TrainingConfig, TranslationalConfig,
//!     TranslationalModel, Triplet,
//! };
//!
//! let triplets = vec![Triplet::new(0, 0, 1), Triplet::new(1, 0, 2)];
//! let shape = GraphShape::covering(&triplets);
//! let mut model = TranslationalModel::new(shape, &TranslationalConfig::default().with_dim(4)).unwrap();
//! let mut sampler = CorruptingSampler::new(shape.num_entities, 42).with_known(&triplets);
//!
//! let report = Trainer::new(TrainingConfig::default().with_epochs(5))
//!     .run(&mut model, &triplets, &mut sampler)
//!     .unwrap();
//! assert_eq!(report.epochs.len(), 5);
//! ```

use crate::error::{Error, Result};
use crate::model::{ScoringModel, StepOutcome, Triplet};
use crate::sampling::NegativeSampler;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of passes over the triplets (default: 100).
    pub epochs: usize,
    /// Log an epoch summary every this many epochs; 0 disables (default: 10).
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            log_every: 10,
        }
    }
}

impl TrainingConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }
}

/// Step counts for one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    /// Steps that violated the margin and updated parameters.
    pub updated: usize,
    /// Steps skipped because the margin already held.
    pub skipped: usize,
    /// EM accumulation steps.
    pub accumulated: usize,
}

impl EpochReport {
    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Updated => self.updated += 1,
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Accumulated => self.accumulated += 1,
        }
    }

    /// Margin violations observed during the epoch.
    pub fn violations(&self) -> usize {
        self.updated
    }
}

/// Result of a full training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model: String,
    pub epochs: Vec<EpochReport>,
}

impl TrainingReport {
    /// Violations per epoch, in order.
    pub fn violation_history(&self) -> Vec<usize> {
        self.epochs.iter().map(EpochReport::violations).collect()
    }

    /// Violations in the last epoch (0 if no epoch ran).
    pub fn final_violations(&self) -> usize {
        self.epochs.last().map_or(0, EpochReport::violations)
    }

    /// Whether the violation count never increased from one epoch to the next.
    pub fn violations_non_increasing(&self) -> bool {
        self.epochs
            .windows(2)
            .all(|w| w[1].violations() <= w[0].violations())
    }
}

/// Runs the epoch protocol over any [`ScoringModel`].
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train `model` on `triplets` for the configured number of epochs.
    pub fn run<M>(
        &self,
        model: &mut M,
        triplets: &[Triplet],
        sampler: &mut dyn NegativeSampler,
    ) -> Result<TrainingReport>
    where
        M: ScoringModel + ?Sized,
    {
        if triplets.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }

        let epochs = self.config.epochs;
        let mut history = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            let mut report = EpochReport {
                epoch,
                ..EpochReport::default()
            };

            model.begin_epoch();
            for triplet in triplets {
                report.record(model.train_on_triplet(triplet, sampler)?);
            }
            model.end_epoch(epoch + 1 == epochs);

            if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
                info!(
                    model = model.name(),
                    epoch,
                    updated = report.updated,
                    skipped = report.skipped,
                    accumulated = report.accumulated,
                    "epoch finished"
                );
            }
            history.push(report);
        }

        let report = TrainingReport {
            model: model.name().to_string(),
            epochs: history,
        };
        debug!(
            model = %report.model,
            epochs = report.epochs.len(),
            final_violations = report.final_violations(),
            "training finished"
        );
        Ok(report)
    }
}

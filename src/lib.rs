//! Latent embedding models for knowledge graph link prediction.
//!
//! A knowledge graph is a set of facts `(head, relation, tail)` over integer
//! entity and relation ids. Every model here learns a latent representation
//! of the ids and assigns each triplet a plausibility score; ranking
//! candidate entities by that score predicts missing links.
//!
//! ## The Models
//!
//! | Model | Representation | Score | Training |
//! |-------|----------------|-------|----------|
//! | [`TopicMixtureModel`] | per-relation topic weights | `Σₖ H·T·P / Z` | batch EM |
//! | [`TranslationalModel`] | entity + input/output relation gates | `-‖e_h ⊙ r_in - e_t ⊙ r_out‖₁` | margin SGD |
//! | [`FactorModel`] | positive, L2-normalized vectors | `Σf_h Σf_t exp(-‖f_h - f_t‖₁/σ)` or KL | margin, derivative step |
//! | [`EnsembleModel`] | F independent factor models | product of factor scores | margin, per-factor step |
//!
//! All of them implement [`ScoringModel`], so the epoch loop in [`Trainer`]
//! and the link predictors ([`ScoringModel::predict_tail`],
//! [`ScoringModel::predict_head`]) work on any of them.
//!
//! ## Negative Sampling
//!
//! Margin models ask a [`NegativeSampler`] for one false triplet per step.
//! [`CorruptingSampler`] replaces the head or the tail with a random entity;
//! [`ScriptedSampler`] replays a fixed list and makes runs reproducible.
//! Any `FnMut(&Triplet) -> Result<Triplet>` closure is a sampler too.
//!
//! ## Usage
//!
//! ```rust
//! use lattix_latent::{
//!     CorruptingSampler, GraphShape, ModelConfig, ScoringModel, Trainer, TrainingConfig, Triplet,
//! };
//!
//! let triplets = vec![Triplet::new(0, 0, 1), Triplet::new(1, 0, 2)];
//! let shape = GraphShape::covering(&triplets);
//!
//! let mut model = ModelConfig::from_json(r#"{ "model": "factor", "dim": 4 }"#)
//!     .unwrap()
//!     .build(shape)
//!     .unwrap();
//! let mut sampler = CorruptingSampler::new(shape.num_entities, 7).with_known(&triplets);
//!
//! Trainer::new(TrainingConfig::default().with_epochs(10))
//!     .run(model.as_mut(), &triplets, &mut sampler)
//!     .unwrap();
//!
//! let ranked = model.predict_tail(0, 0, 3).unwrap();
//! assert_eq!(ranked.len(), 3);
//! ```
//!
//! ## Logging
//!
//! Models and the trainer emit [`tracing`] events: construction parameters
//! at `info`, per-epoch summaries at `info`, EM priors at `debug` and margin
//! skips at `trace`. Install any subscriber to see them.

pub mod config;
pub mod error;
pub mod model;
pub mod models;
pub mod sampling;
pub mod training;
pub mod vector;

pub use config::{
    EnsembleConfig, FactorConfig, FactorForm, ModelConfig, TopicConfig, TranslationalConfig,
};
pub use error::{Error, Result};
pub use model::{GraphShape, Prediction, ScoringModel, StepOutcome, Triplet};
pub use models::{EnsembleModel, FactorModel, FactorTables, TopicMixtureModel, TranslationalModel};
pub use sampling::{CorruptingSampler, NegativeSampler, ScriptedSampler};
pub use training::{EpochReport, Trainer, TrainingConfig, TrainingReport};

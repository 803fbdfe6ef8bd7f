//! Hyperparameters for every model, and a single construction surface.
//!
//! Each model has its own config struct with `Default`, `with_*` builders
//! and `validate()`. [`ModelConfig`] tags them so a model can be chosen from
//! JSON:
//!
//! ```rust
//! use lattix_latent::{GraphShape, ModelConfig};
//!
//! let config = ModelConfig::from_json(
//!     r#"{ "model": "translational", "dim": 8, "learning_rate": 0.01, "margin": 1.0 }"#,
//! ).unwrap();
//! let model = config.build(GraphShape::new(4, 2)).unwrap();
//! assert_eq!(model.embedding_dim(), 8);
//! ```

use crate::error::{Error, Result};
use crate::model::{GraphShape, ScoringModel};
use crate::models::{EnsembleModel, FactorModel, TopicMixtureModel, TranslationalModel};
use serde::{Deserialize, Serialize};

fn positive_count(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidConfig(format!("{name} must be positive")));
    }
    Ok(())
}

fn positive_real(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

fn finite_real(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidConfig(format!(
            "{name} must be finite, got {value}"
        )));
    }
    Ok(())
}

/// Topic mixture (EM) hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Number of latent topics K (default: 10).
    pub topics: usize,
    /// Initialization seed (default: 42).
    pub seed: u64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            topics: 10,
            seed: 42,
        }
    }
}

impl TopicConfig {
    pub fn with_topics(mut self, topics: usize) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        positive_count("topics", self.topics)
    }
}

/// Translational (margin, L1) hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationalConfig {
    /// Embedding dimension D (default: 20).
    pub dim: usize,
    /// Learning rate α (default: 0.01).
    pub learning_rate: f64,
    /// Margin threshold τ (default: 1.0).
    pub margin: f64,
    /// Initialization seed (default: 42).
    pub seed: u64,
}

impl Default for TranslationalConfig {
    fn default() -> Self {
        Self {
            dim: 20,
            learning_rate: 0.01,
            margin: 1.0,
            seed: 42,
        }
    }
}

impl TranslationalConfig {
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        positive_count("dim", self.dim)?;
        positive_real("learning_rate", self.learning_rate)?;
        finite_real("margin", self.margin)
    }
}

/// Which member of the factor family scores triplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorForm {
    /// Negative KL divergence between floored head and tail features.
    KullbackLeibler,
    /// Σh · Σt · exp(-||h - t||₁ / σ).
    #[default]
    ExponentialProduct,
}

/// Factor model hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorConfig {
    /// Embedding dimension D (default: 20).
    pub dim: usize,
    /// Learning rate α (default: 0.01).
    pub learning_rate: f64,
    /// Margin (default: 1.0).
    pub margin: f64,
    /// Temperature σ (default: 1.0).
    pub sigma: f64,
    /// Feature floor for the KL form (default: 1e-6).
    pub smoothing: f64,
    /// Scoring form (default: exponential product).
    pub form: FactorForm,
    /// Initialization seed (default: 42).
    pub seed: u64,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            dim: 20,
            learning_rate: 0.01,
            margin: 1.0,
            sigma: 1.0,
            smoothing: 1e-6,
            form: FactorForm::ExponentialProduct,
            seed: 42,
        }
    }
}

impl FactorConfig {
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_form(mut self, form: FactorForm) -> Self {
        self.form = form;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        positive_count("dim", self.dim)?;
        positive_real("learning_rate", self.learning_rate)?;
        positive_real("sigma", self.sigma)?;
        finite_real("margin", self.margin)?;
        match self.form {
            // log(h / t) needs a strictly positive floor
            FactorForm::KullbackLeibler => positive_real("smoothing", self.smoothing),
            FactorForm::ExponentialProduct => {
                if self.smoothing.is_finite() && self.smoothing >= 0.0 {
                    Ok(())
                } else {
                    Err(Error::InvalidConfig(format!(
                        "smoothing must be non-negative, got {}",
                        self.smoothing
                    )))
                }
            }
        }
    }
}

/// Product-of-experts ensemble hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Embedding dimension D of every factor (default: 20).
    pub dim: usize,
    /// Learning rate α (default: 0.01).
    pub learning_rate: f64,
    /// Per-factor margin (default: 1.0).
    pub margin: f64,
    /// Temperature σ shared by all factors (default: 1.0).
    pub sigma: f64,
    /// Number of factors F (default: 3).
    pub factors: usize,
    /// Initialization seed; factor `i` uses `seed + i` (default: 42).
    pub seed: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            dim: 20,
            learning_rate: 0.01,
            margin: 1.0,
            sigma: 1.0,
            factors: 3,
            seed: 42,
        }
    }
}

impl EnsembleConfig {
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn with_factors(mut self, factors: usize) -> Self {
        self.factors = factors;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        positive_count("dim", self.dim)?;
        positive_count("factors", self.factors)?;
        positive_real("learning_rate", self.learning_rate)?;
        positive_real("sigma", self.sigma)?;
        finite_real("margin", self.margin)
    }
}

/// Any model's configuration, tagged by `"model"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelConfig {
    Topic(TopicConfig),
    Translational(TranslationalConfig),
    Factor(FactorConfig),
    Ensemble(EnsembleConfig),
}

impl ModelConfig {
    /// Parse a tagged JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Topic(c) => c.validate(),
            Self::Translational(c) => c.validate(),
            Self::Factor(c) => c.validate(),
            Self::Ensemble(c) => c.validate(),
        }
    }

    /// Build the configured model for a graph of the given shape.
    pub fn build(&self, shape: GraphShape) -> Result<Box<dyn ScoringModel>> {
        Ok(match self {
            Self::Topic(c) => Box::new(TopicMixtureModel::new(shape, c)?),
            Self::Translational(c) => Box::new(TranslationalModel::new(shape, c)?),
            Self::Factor(c) => Box::new(FactorModel::new(shape, c)?),
            Self::Ensemble(c) => Box::new(EnsembleModel::new(shape, c)?),
        })
    }
}

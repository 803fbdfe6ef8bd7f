//! Product-of-experts ensemble of exponential-product factors.
//!
//! F independent [`FactorTables`] share a dimension and a temperature but no
//! parameters. The ensemble score is the literal product of factor scores,
//! so every factor has to agree for a triplet to score high:
//!
//! ```text
//! score(t) = Πᵢ Σf_hⁱ · Σf_tⁱ · exp(-‖f_hⁱ - f_tⁱ‖₁ / σ)
//! ```
//!
//! Training compares the ensemble ratio against `exp(F · margin / σ)` (the
//! per-factor threshold raised to the F-th power). Below it, each factor
//! takes its own derivative step on the positive (`+α`) and the negative
//! (`-α`); there is no coupling between factors.

use super::FactorTables;
use crate::config::EnsembleConfig;
use crate::error::Result;
use crate::model::{GraphShape, ScoringModel, StepOutcome, Triplet};
use crate::sampling::NegativeSampler;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing::{info, trace};

#[derive(Debug, Clone)]
pub struct EnsembleModel {
    shape: GraphShape,
    dim: usize,
    learning_rate: f64,
    margin: f64,
    sigma: f64,
    factors: Vec<FactorTables>,
}

impl EnsembleModel {
    /// Factor `i` is seeded with `config.seed + i`.
    pub fn new(shape: GraphShape, config: &EnsembleConfig) -> Result<Self> {
        config.validate()?;
        shape.ensure_non_empty()?;

        let factors = (0..config.factors as u64)
            .map(|i| {
                let mut rng = XorShiftRng::seed_from_u64(config.seed.wrapping_add(i));
                FactorTables::with_uniform_relations(shape, config.dim, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            model = "FactorEnsemble",
            dim = config.dim,
            learning_rate = config.learning_rate,
            margin = config.margin,
            sigma = config.sigma,
            factors = config.factors,
            "initialized factor ensemble"
        );

        Ok(Self {
            shape,
            dim: config.dim,
            learning_rate: config.learning_rate,
            margin: config.margin,
            sigma: config.sigma,
            factors,
        })
    }

    /// Number of factors F.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Factor `index`, if it exists.
    pub fn factor(&self, index: usize) -> Option<&FactorTables> {
        self.factors.get(index)
    }

    /// Every factor's individual score, in factor order.
    pub fn factor_scores(&self, triplet: &Triplet) -> Result<Vec<f64>> {
        self.factors
            .iter()
            .map(|factor| factor.exp_product_score(triplet, self.sigma))
            .collect()
    }
}

impl ScoringModel for EnsembleModel {
    fn name(&self) -> &'static str {
        "FactorEnsemble"
    }

    fn shape(&self) -> GraphShape {
        self.shape
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn score(&self, triplet: &Triplet) -> Result<f64> {
        self.shape.check(triplet)?;
        Ok(self.factor_scores(triplet)?.into_iter().product())
    }

    fn train_on_triplet(
        &mut self,
        triplet: &Triplet,
        sampler: &mut dyn NegativeSampler,
    ) -> Result<StepOutcome> {
        let positive = self.score(triplet)?;
        let negative_triplet = sampler.sample_false_triplet(triplet)?;
        let negative = self.score(&negative_triplet)?;

        let threshold = (self.factors.len() as f64 * self.margin / self.sigma).exp();
        if positive / negative > threshold {
            trace!(?triplet, negative = ?negative_triplet, positive, "margin satisfied");
            return Ok(StepOutcome::Skipped);
        }

        for factor in &mut self.factors {
            factor.derivative_step(triplet, self.learning_rate, self.sigma)?;
            factor.derivative_step(&negative_triplet, -self.learning_rate, self.sigma)?;
        }
        Ok(StepOutcome::Updated)
    }
}

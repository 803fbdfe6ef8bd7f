//! Elementwise factor models.
//!
//! Entities and relations live in the positive orthant. A relation has a
//! head-side and a tail-side vector; the elementwise product of an entity
//! with the matching relation side is its *feature* for that relation:
//!
//! ```text
//! f_h = e_h ⊙ r_head        f_t = e_t ⊙ r_tail
//! ```
//!
//! A triplet is plausible when the two features agree.
//!
//! # Forms
//!
//! | Form | Score |
//! |------|-------|
//! | KL | -Σᵢ f̃_hᵢ · ln(f̃_hᵢ / f̃_tᵢ), with f̃ = max(f, s) |
//! | Exponential product | Σf_h · Σf_t · exp(-‖f_h - f_t‖₁ / σ) |
//!
//! # Training
//!
//! One negative per positive. The exponential form skips pairs whose score
//! ratio already exceeds `exp(margin / σ)`; the KL form, whose score is
//! already a log quantity, skips when the score difference exceeds `margin`.
//! Otherwise the positive takes a step at `+α` and the negative at `-α`:
//!
//! ```text
//! g       = -sign(f_h - f_t) / σ
//! e_h    += α (g ⊙ r_head + r_head / Σf_h)
//! r_head += α (g ⊙ e_h    + e_h    / Σf_h)
//! e_t    += α (-g ⊙ r_tail + f_t / e_t    / Σf_t)
//! r_tail += α (-g ⊙ e_t    + f_t / r_tail / Σf_t)
//! ```
//!
//! All right-hand sides use the values from before the step. Every touched
//! vector is then floored at `1 / D⁵` and rescaled to unit L2 norm.

use crate::config::{FactorConfig, FactorForm};
use crate::error::{Error, Result};
use crate::model::{GraphShape, ScoringModel, StepOutcome, Triplet};
use crate::sampling::NegativeSampler;
use crate::vector::{floor_and_normalize, guarded_div, l1_distance, sign, EPSILON};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing::{info, trace};

/// Parameter tables of one elementwise factor.
///
/// Used directly by [`FactorModel`] and once per factor by
/// [`super::EnsembleModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTables {
    shape: GraphShape,
    dim: usize,
    entity: Array2<f64>,
    relation_head: Array2<f64>,
    relation_tail: Array2<f64>,
}

impl FactorTables {
    /// Random positive entities and relation sides.
    pub fn random(shape: GraphShape, dim: usize, rng: &mut XorShiftRng) -> Result<Self> {
        let entity = super::uniform_table((shape.num_entities, dim), 0.0, 1.0, rng)?;
        let relation_head = super::uniform_table((shape.num_relations, dim), 0.0, 1.0, rng)?;
        let relation_tail = super::uniform_table((shape.num_relations, dim), 0.0, 1.0, rng)?;
        Self::from_tables(shape, entity, relation_head, relation_tail)
    }

    /// Random positive entities; every relation side starts uniform.
    pub fn with_uniform_relations(
        shape: GraphShape,
        dim: usize,
        rng: &mut XorShiftRng,
    ) -> Result<Self> {
        let entity = super::uniform_table((shape.num_entities, dim), 0.0, 1.0, rng)?;
        let relations = Array2::ones((shape.num_relations, dim));
        Self::from_tables(shape, entity, relations.clone(), relations)
    }

    /// Build from explicit tables; every row is floored and unit-normalized.
    pub fn from_tables(
        shape: GraphShape,
        mut entity: Array2<f64>,
        mut relation_head: Array2<f64>,
        mut relation_tail: Array2<f64>,
    ) -> Result<Self> {
        let dim = entity.ncols();
        if dim == 0 {
            return Err(Error::InvalidConfig("factor dimension must be positive".into()));
        }
        for (name, table, rows) in [
            ("entity", &entity, shape.num_entities),
            ("relation_head", &relation_head, shape.num_relations),
            ("relation_tail", &relation_tail, shape.num_relations),
        ] {
            if table.dim() != (rows, dim) {
                return Err(Error::InvalidConfig(format!(
                    "{name} table has shape {:?}, expected ({rows}, {dim})",
                    table.dim()
                )));
            }
        }

        let floor = floor_for(dim);
        for table in [&mut entity, &mut relation_head, &mut relation_tail] {
            for row in table.rows_mut() {
                floor_and_normalize(row, floor);
            }
        }

        Ok(Self {
            shape,
            dim,
            entity,
            relation_head,
            relation_tail,
        })
    }

    pub fn shape(&self) -> GraphShape {
        self.shape
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Lower bound applied to every entry after an update: `1 / D⁵`.
    pub fn floor(&self) -> f64 {
        floor_for(self.dim)
    }

    fn features(&self, triplet: &Triplet) -> (Array1<f64>, Array1<f64>) {
        let head = &self.entity.row(triplet.head) * &self.relation_head.row(triplet.relation);
        let tail = &self.entity.row(triplet.tail) * &self.relation_tail.row(triplet.relation);
        (head, tail)
    }

    /// Σf_h · Σf_t · exp(-‖f_h - f_t‖₁ / σ)
    pub fn exp_product_score(&self, triplet: &Triplet, sigma: f64) -> Result<f64> {
        self.shape.check(triplet)?;
        let (head, tail) = self.features(triplet);
        Ok(head.sum() * tail.sum() * (-l1_distance(head.view(), tail.view()) / sigma).exp())
    }

    /// Negative KL divergence between the features floored at `smoothing`.
    pub fn kl_score(&self, triplet: &Triplet, smoothing: f64) -> Result<f64> {
        self.shape.check(triplet)?;
        let (head, tail) = self.features(triplet);
        let divergence: f64 = head
            .iter()
            .zip(tail.iter())
            .map(|(&h, &t)| {
                let (h, t) = (h.max(smoothing), t.max(smoothing));
                h * (h / t).ln()
            })
            .sum();
        Ok(-divergence)
    }

    /// Apply one derivative step at `rate` (positive to pull a true triplet
    /// together, negative to push a corrupted one apart).
    pub fn derivative_step(&mut self, triplet: &Triplet, rate: f64, sigma: f64) -> Result<()> {
        self.shape.check(triplet)?;
        let Triplet {
            head,
            tail,
            relation,
        } = *triplet;

        let e_h = self.entity.row(head).to_owned();
        let e_t = self.entity.row(tail).to_owned();
        let r_h = self.relation_head.row(relation).to_owned();
        let r_t = self.relation_tail.row(relation).to_owned();

        let head_feature = &e_h * &r_h;
        let tail_feature = &e_t * &r_t;
        let grad = sign((&head_feature - &tail_feature).view()) / -sigma;
        let head_mass = head_feature.sum() + EPSILON;
        let tail_mass = tail_feature.sum() + EPSILON;

        let d_e_h = &grad * &r_h + &r_h / head_mass;
        let d_r_h = &grad * &e_h + &e_h / head_mass;
        // f_t / e_t and f_t / r_t divide by live parameters; see guarded_div.
        let d_e_t = -(&grad * &r_t) + guarded_div(tail_feature.view(), e_t.view()) / tail_mass;
        let d_r_t = -(&grad * &e_t) + guarded_div(tail_feature.view(), r_t.view()) / tail_mass;

        self.entity.row_mut(head).scaled_add(rate, &d_e_h);
        self.relation_head.row_mut(relation).scaled_add(rate, &d_r_h);
        self.entity.row_mut(tail).scaled_add(rate, &d_e_t);
        self.relation_tail.row_mut(relation).scaled_add(rate, &d_r_t);

        let floor = self.floor();
        floor_and_normalize(self.entity.row_mut(head), floor);
        floor_and_normalize(self.entity.row_mut(tail), floor);
        floor_and_normalize(self.relation_head.row_mut(relation), floor);
        floor_and_normalize(self.relation_tail.row_mut(relation), floor);
        Ok(())
    }

    pub fn entity(&self, entity: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_entity(entity)?;
        Ok(self.entity.row(entity))
    }

    pub fn relation_head(&self, relation: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        Ok(self.relation_head.row(relation))
    }

    pub fn relation_tail(&self, relation: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        Ok(self.relation_tail.row(relation))
    }
}

fn floor_for(dim: usize) -> f64 {
    1.0 / (dim as f64).powi(5)
}

/// Single elementwise factor model, KL or exponential-product form.
#[derive(Debug, Clone)]
pub struct FactorModel {
    tables: FactorTables,
    learning_rate: f64,
    margin: f64,
    sigma: f64,
    smoothing: f64,
    form: FactorForm,
}

impl FactorModel {
    pub fn new(shape: GraphShape, config: &FactorConfig) -> Result<Self> {
        config.validate()?;
        shape.ensure_non_empty()?;
        let mut rng = XorShiftRng::seed_from_u64(config.seed);
        let tables = FactorTables::random(shape, config.dim, &mut rng)?;
        Self::from_tables(tables, config)
    }

    /// Wrap existing tables; `config.dim` must match their dimension.
    pub fn from_tables(tables: FactorTables, config: &FactorConfig) -> Result<Self> {
        config.validate()?;
        if tables.dim() != config.dim {
            return Err(Error::InvalidConfig(format!(
                "tables have dimension {}, config expects {}",
                tables.dim(),
                config.dim
            )));
        }
        let model = Self {
            tables,
            learning_rate: config.learning_rate,
            margin: config.margin,
            sigma: config.sigma,
            smoothing: config.smoothing,
            form: config.form,
        };
        info!(
            model = model.name(),
            dim = config.dim,
            learning_rate = config.learning_rate,
            margin = config.margin,
            sigma = config.sigma,
            smoothing = config.smoothing,
            "initialized factor model"
        );
        Ok(model)
    }

    pub fn form(&self) -> FactorForm {
        self.form
    }

    pub fn tables(&self) -> &FactorTables {
        &self.tables
    }

    fn separated(&self, positive: f64, negative: f64) -> bool {
        match self.form {
            FactorForm::ExponentialProduct => {
                positive / negative > (self.margin / self.sigma).exp()
            }
            FactorForm::KullbackLeibler => positive - negative > self.margin,
        }
    }
}

impl ScoringModel for FactorModel {
    fn name(&self) -> &'static str {
        match self.form {
            FactorForm::KullbackLeibler => "FactorKL",
            FactorForm::ExponentialProduct => "FactorE",
        }
    }

    fn shape(&self) -> GraphShape {
        self.tables.shape()
    }

    fn embedding_dim(&self) -> usize {
        self.tables.dim()
    }

    fn score(&self, triplet: &Triplet) -> Result<f64> {
        match self.form {
            FactorForm::KullbackLeibler => self.tables.kl_score(triplet, self.smoothing),
            FactorForm::ExponentialProduct => self.tables.exp_product_score(triplet, self.sigma),
        }
    }

    fn train_on_triplet(
        &mut self,
        triplet: &Triplet,
        sampler: &mut dyn NegativeSampler,
    ) -> Result<StepOutcome> {
        let positive = self.score(triplet)?;
        let negative_triplet = sampler.sample_false_triplet(triplet)?;
        let negative = self.score(&negative_triplet)?;

        if self.separated(positive, negative) {
            trace!(?triplet, negative = ?negative_triplet, positive, "margin satisfied");
            return Ok(StepOutcome::Skipped);
        }

        self.tables
            .derivative_step(triplet, self.learning_rate, self.sigma)?;
        self.tables
            .derivative_step(&negative_triplet, -self.learning_rate, self.sigma)?;
        Ok(StepOutcome::Updated)
    }
}

//! Topic mixture model trained by batch EM.
//!
//! Every (relation, entity) pair carries a head-side and a tail-side weight
//! vector over K latent topics. Per topic, each side is a distribution over
//! all (relation, entity) keys; `P` is the topic prior and `R[r]` a per
//! relation normalizer derived from both sides.
//!
//! # Scoring
//!
//! ```text
//! score(h, r, t) = Σₖ H[r,h]ₖ · T[r,t]ₖ · Pₖ / R[r]ₖ + ε
//! ```
//!
//! # Training
//!
//! One epoch is one EM iteration:
//!
//! ```text
//! begin_epoch      Hacc, Tacc, Pacc := 0
//! per triplet      Hacc[r,h] += H[r,h] ⊙ P / score
//!                  Tacc[r,t] += T[r,t] ⊙ P / score
//!                  Pacc      += P / score
//! end_epoch        H, T, P := Hacc, Tacc, Pacc; renormalize; rebuild R
//! ```
//!
//! The accumulators are read by nothing but `end_epoch`, so scoring during
//! an epoch always sees the previous iteration's parameters.

use crate::config::TopicConfig;
use crate::error::Result;
use crate::model::{GraphShape, ScoringModel, StepOutcome, Triplet};
use crate::sampling::NegativeSampler;
use crate::vector::EPSILON;
use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing::{debug, info, warn};

/// Probabilistic topic mixture over (relation, entity) keys.
#[derive(Debug, Clone)]
pub struct TopicMixtureModel {
    shape: GraphShape,
    topics: usize,
    /// H, shape (relations, entities, topics).
    head: Array3<f64>,
    /// T, shape (relations, entities, topics).
    tail: Array3<f64>,
    /// P, length topics.
    prior: Array1<f64>,
    /// R, shape (relations, topics).
    relation_norm: Array2<f64>,
    acc_head: Array3<f64>,
    acc_tail: Array3<f64>,
    acc_prior: Array1<f64>,
    /// Triplets accumulated since the last `begin_epoch`.
    accumulated: usize,
}

impl TopicMixtureModel {
    /// Build a model with random positive H and T and a uniform prior.
    pub fn new(shape: GraphShape, config: &TopicConfig) -> Result<Self> {
        config.validate()?;
        shape.ensure_non_empty()?;

        let k = config.topics;
        let dims = (shape.num_relations, shape.num_entities, k);
        let scale = (6.0 / k as f64).sqrt();
        let mut rng = XorShiftRng::seed_from_u64(config.seed);

        let head = super::uniform_table(dims, 0.0, scale, &mut rng)?;
        let tail = super::uniform_table(dims, 0.0, scale, &mut rng)?;

        let mut model = Self {
            shape,
            topics: k,
            head,
            tail,
            prior: Array1::from_elem(k, 1.0 / k as f64),
            relation_norm: Array2::zeros((shape.num_relations, k)),
            acc_head: Array3::zeros(dims),
            acc_tail: Array3::zeros(dims),
            acc_prior: Array1::zeros(k),
            accumulated: 0,
        };
        model.normalize_to_distribution();
        model.rebuild_relation_norm();

        info!(
            model = model.name(),
            topics = k,
            entities = shape.num_entities,
            relations = shape.num_relations,
            seed = config.seed,
            "initialized topic mixture"
        );
        Ok(model)
    }

    /// Make H and T per-topic distributions over all keys and P a distribution.
    ///
    /// Each topic column of H (and independently T) is divided by its total
    /// when that total exceeds ε. A floor of `0.01 / (entities · relations)` is
    /// then added to every entry and the columns rescaled once more, so every
    /// entry stays strictly positive while each column still sums to 1.
    pub fn normalize_to_distribution(&mut self) {
        let floor = 0.01 / (self.shape.num_entities * self.shape.num_relations) as f64;
        for table in [&mut self.head, &mut self.tail] {
            normalize_topic_columns(table);
            table.mapv_inplace(|x| x + floor);
            normalize_topic_columns(table);
        }
        let total = self.prior.sum();
        self.prior.mapv_inplace(|p| p / (total + EPSILON));
    }

    /// R[r] = Σₑ (H[r,e] + T[r,e]), scaled to sum 1.
    fn rebuild_relation_norm(&mut self) {
        for r in 0..self.shape.num_relations {
            let mut norm = self.head.index_axis(Axis(0), r).sum_axis(Axis(0));
            norm += &self.tail.index_axis(Axis(0), r).sum_axis(Axis(0));
            let total = norm.sum();
            norm.mapv_inplace(|x| x / (total + EPSILON));
            self.relation_norm.row_mut(r).assign(&norm);
        }
    }

    fn likelihood(&self, triplet: &Triplet) -> f64 {
        let h = self.head.slice(s![triplet.relation, triplet.head, ..]);
        let t = self.tail.slice(s![triplet.relation, triplet.tail, ..]);
        let norm = self.relation_norm.row(triplet.relation);
        let mut total = 0.0;
        for k in 0..self.topics {
            total += h[k] * t[k] * self.prior[k] / norm[k];
        }
        total + EPSILON
    }

    /// Number of latent topics K.
    pub fn topics(&self) -> usize {
        self.topics
    }

    /// Head-side topic weights H[relation, entity].
    pub fn head_weights(&self, relation: usize, entity: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        self.shape.check_entity(entity)?;
        Ok(self.head.slice(s![relation, entity, ..]))
    }

    /// Tail-side topic weights T[relation, entity].
    pub fn tail_weights(&self, relation: usize, entity: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        self.shape.check_entity(entity)?;
        Ok(self.tail.slice(s![relation, entity, ..]))
    }

    /// Whole head table, shape (relations, entities, topics).
    pub fn head_table(&self) -> &Array3<f64> {
        &self.head
    }

    /// Whole tail table, shape (relations, entities, topics).
    pub fn tail_table(&self) -> &Array3<f64> {
        &self.tail
    }

    /// Topic prior P.
    pub fn topic_prior(&self) -> ArrayView1<'_, f64> {
        self.prior.view()
    }

    /// Per-relation normalizer R[relation].
    pub fn relation_normalizer(&self, relation: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        Ok(self.relation_norm.row(relation))
    }
}

/// Divide each topic column by its total over all (relation, entity) keys.
fn normalize_topic_columns(table: &mut Array3<f64>) {
    for mut column in table.axis_iter_mut(Axis(2)) {
        let total = column.sum();
        if total > EPSILON {
            column.mapv_inplace(|x| x / total);
        }
    }
}

impl ScoringModel for TopicMixtureModel {
    fn name(&self) -> &'static str {
        "TopicMixture"
    }

    fn shape(&self) -> GraphShape {
        self.shape
    }

    fn embedding_dim(&self) -> usize {
        self.topics
    }

    fn score(&self, triplet: &Triplet) -> Result<f64> {
        self.shape.check(triplet)?;
        Ok(self.likelihood(triplet))
    }

    fn train_on_triplet(
        &mut self,
        triplet: &Triplet,
        _sampler: &mut dyn NegativeSampler,
    ) -> Result<StepOutcome> {
        self.shape.check(triplet)?;
        let score = self.likelihood(triplet);
        let weighted_prior = &self.prior / score;

        let h = self.head.slice(s![triplet.relation, triplet.head, ..]);
        let head_step = &h * &weighted_prior;
        self.acc_head
            .slice_mut(s![triplet.relation, triplet.head, ..])
            .scaled_add(1.0, &head_step);

        let t = self.tail.slice(s![triplet.relation, triplet.tail, ..]);
        let tail_step = &t * &weighted_prior;
        self.acc_tail
            .slice_mut(s![triplet.relation, triplet.tail, ..])
            .scaled_add(1.0, &tail_step);

        self.acc_prior += &weighted_prior;
        self.accumulated += 1;
        Ok(StepOutcome::Accumulated)
    }

    fn begin_epoch(&mut self) {
        self.acc_head.fill(0.0);
        self.acc_tail.fill(0.0);
        self.acc_prior.fill(0.0);
        self.accumulated = 0;
    }

    fn end_epoch(&mut self, is_final: bool) {
        if self.accumulated == 0 {
            warn!(
                model = self.name(),
                "epoch ended with no accumulated triplets; keeping previous parameters"
            );
            return;
        }

        std::mem::swap(&mut self.head, &mut self.acc_head);
        std::mem::swap(&mut self.tail, &mut self.acc_tail);
        std::mem::swap(&mut self.prior, &mut self.acc_prior);
        self.begin_epoch();

        self.normalize_to_distribution();
        self.rebuild_relation_norm();

        debug!(model = self.name(), is_final, prior = ?self.prior.to_vec(), "merged EM accumulators");
        if is_final {
            info!(model = self.name(), prior = ?self.prior.to_vec(), "final topic prior");
        }
    }
}

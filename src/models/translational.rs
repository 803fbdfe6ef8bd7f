//! Translational model with per-relation input/output gates.
//!
//! Each relation owns two vectors, `r_in` and `r_out`, that rescale the head
//! and tail entity elementwise before they are compared:
//!
//! ```text
//! e_h ⊙ r_in ≈ e_t ⊙ r_out   (if the triplet is true)
//! ```
//!
//! # Scoring
//!
//! Score = -||e_h ⊙ r_in - e_t ⊙ r_out||₁ (0 is the best possible score).
//!
//! # Training
//!
//! Margin-based with one negative per positive. When
//! `score(pos) - score(neg) > margin` the pair is skipped. Otherwise an L1
//! subgradient step pulls the positive endpoints together and pushes the
//! negative ones apart:
//!
//! ```text
//! g     = -sign(e_h ⊙ r_in - e_t ⊙ r_out)
//! e_h  += ±α g ⊙ r_in
//! r_in += ±α g ⊙ e_h        (pre-step e_h)
//! e_t  -= ±α g ⊙ r_out
//! ```
//!
//! `r_out` receives no gradient; it only gets renormalized.
//!
//! # Constraints
//!
//! Touched entities are projected into the unit L2 ball; `r_in` and `r_out`
//! of every touched relation are rescaled to unit L2 norm.

use crate::config::TranslationalConfig;
use crate::error::{Error, Result};
use crate::model::{GraphShape, ScoringModel, StepOutcome, Triplet};
use crate::sampling::NegativeSampler;
use crate::vector::{clip_to_unit_ball, l1_distance, normalize_l2, sign};
use ndarray::{Array2, ArrayView1};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing::{info, trace};

/// Margin-trained translational model with input/output relation gates.
#[derive(Debug, Clone)]
pub struct TranslationalModel {
    shape: GraphShape,
    dim: usize,
    learning_rate: f64,
    margin: f64,
    /// One row per entity.
    entity: Array2<f64>,
    /// One row per relation, applied to the head.
    relation_in: Array2<f64>,
    /// One row per relation, applied to the tail.
    relation_out: Array2<f64>,
}

impl TranslationalModel {
    /// Random entities and input gates in `±√(6/D)`, uniform output gates.
    pub fn new(shape: GraphShape, config: &TranslationalConfig) -> Result<Self> {
        config.validate()?;
        shape.ensure_non_empty()?;

        let dim = config.dim;
        let scale = (6.0 / dim as f64).sqrt();
        let mut rng = XorShiftRng::seed_from_u64(config.seed);

        let relation_in =
            super::uniform_table((shape.num_relations, dim), -scale, scale, &mut rng)?;
        let relation_out = Array2::ones((shape.num_relations, dim));
        let entity = super::uniform_table((shape.num_entities, dim), -scale, scale, &mut rng)?;

        Self::from_tables(shape, config, entity, relation_in, relation_out)
    }

    /// Build from explicit tables. Rows are projected onto the constraints.
    pub fn from_tables(
        shape: GraphShape,
        config: &TranslationalConfig,
        mut entity: Array2<f64>,
        mut relation_in: Array2<f64>,
        mut relation_out: Array2<f64>,
    ) -> Result<Self> {
        config.validate()?;
        let dim = config.dim;
        check_table("entity", &entity, shape.num_entities, dim)?;
        check_table("relation_in", &relation_in, shape.num_relations, dim)?;
        check_table("relation_out", &relation_out, shape.num_relations, dim)?;

        entity.rows_mut().into_iter().for_each(clip_to_unit_ball);
        relation_in.rows_mut().into_iter().for_each(normalize_l2);
        relation_out.rows_mut().into_iter().for_each(normalize_l2);

        let model = Self {
            shape,
            dim,
            learning_rate: config.learning_rate,
            margin: config.margin,
            entity,
            relation_in,
            relation_out,
        };
        info!(
            model = model.name(),
            dim,
            learning_rate = config.learning_rate,
            margin = config.margin,
            entities = shape.num_entities,
            relations = shape.num_relations,
            "initialized translational model"
        );
        Ok(model)
    }

    fn distance(&self, triplet: &Triplet) -> f64 {
        let head = &self.entity.row(triplet.head) * &self.relation_in.row(triplet.relation);
        let tail = &self.entity.row(triplet.tail) * &self.relation_out.row(triplet.relation);
        l1_distance(head.view(), tail.view())
    }

    /// One subgradient step; `direction` is +1 for a positive, -1 for a negative.
    fn step(&mut self, triplet: &Triplet, direction: f64) {
        let Triplet {
            head,
            tail,
            relation,
        } = *triplet;
        let e_h = self.entity.row(head).to_owned();
        let e_t = self.entity.row(tail).to_owned();
        let r_in = self.relation_in.row(relation).to_owned();
        let r_out = self.relation_out.row(relation).to_owned();

        let g = -sign((&e_h * &r_in - &e_t * &r_out).view());
        let rate = direction * self.learning_rate;

        self.entity.row_mut(head).scaled_add(rate, &(&g * &r_in));
        self.relation_in.row_mut(relation).scaled_add(rate, &(&g * &e_h));
        self.entity.row_mut(tail).scaled_add(-rate, &(&g * &r_out));
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn entity_embedding(&self, entity: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_entity(entity)?;
        Ok(self.entity.row(entity))
    }

    pub fn relation_in(&self, relation: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        Ok(self.relation_in.row(relation))
    }

    pub fn relation_out(&self, relation: usize) -> Result<ArrayView1<'_, f64>> {
        self.shape.check_relation(relation)?;
        Ok(self.relation_out.row(relation))
    }
}

fn check_table(name: &str, table: &Array2<f64>, rows: usize, dim: usize) -> Result<()> {
    if table.dim() != (rows, dim) {
        return Err(Error::InvalidConfig(format!(
            "{name} table has shape {:?}, expected ({rows}, {dim})",
            table.dim()
        )));
    }
    Ok(())
}

impl ScoringModel for TranslationalModel {
    fn name(&self) -> &'static str {
        "Translational"
    }

    fn shape(&self) -> GraphShape {
        self.shape
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn score(&self, triplet: &Triplet) -> Result<f64> {
        self.shape.check(triplet)?;
        Ok(-self.distance(triplet))
    }

    fn train_on_triplet(
        &mut self,
        triplet: &Triplet,
        sampler: &mut dyn NegativeSampler,
    ) -> Result<StepOutcome> {
        self.shape.check(triplet)?;
        let negative = sampler.sample_false_triplet(triplet)?;
        self.shape.check(&negative)?;

        let gap = self.distance(&negative) - self.distance(triplet);
        if gap > self.margin {
            trace!(?triplet, ?negative, gap, "margin satisfied");
            return Ok(StepOutcome::Skipped);
        }

        self.step(triplet, 1.0);
        self.step(&negative, -1.0);

        for entity in [triplet.head, triplet.tail, negative.head, negative.tail] {
            clip_to_unit_ball(self.entity.row_mut(entity));
        }
        for relation in [triplet.relation, negative.relation] {
            normalize_l2(self.relation_in.row_mut(relation));
            normalize_l2(self.relation_out.row_mut(relation));
        }
        Ok(StepOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::ScriptedSampler;
    use crate::vector::l2_norm;
    use ndarray::array;

    /// Entities 0 and 1 coincide, 2 is their mirror image; one relation.
    fn hand_model(margin: f64) -> TranslationalModel {
        let config = TranslationalConfig::default()
            .with_dim(2)
            .with_margin(margin)
            .with_learning_rate(0.1);
        TranslationalModel::from_tables(
            GraphShape::new(3, 1),
            &config,
            array![[0.5, 0.5], [0.5, 0.5], [-0.5, -0.5]],
            array![[0.6, 0.8]],
            array![[0.6, 0.8]],
        )
        .unwrap()
    }

    #[test]
    fn test_score_is_negative_l1() {
        let model = hand_model(1.0);
        assert_eq!(model.score(&Triplet::new(0, 0, 1)).unwrap(), 0.0);
        // |0.3 + 0.3| + |0.4 + 0.4| = 1.4
        let s = model.score(&Triplet::new(0, 0, 2)).unwrap();
        assert!((s + 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_margin_skip_is_bit_identical() {
        let mut model = hand_model(1.0);
        let before = model.clone();
        let mut sampler = ScriptedSampler::new(vec![Triplet::new(0, 0, 2)]);
        let outcome = model
            .train_on_triplet(&Triplet::new(0, 0, 1), &mut sampler)
            .unwrap();
        assert_eq!(outcome, StepOutcome::Skipped);
        assert_eq!(model.entity, before.entity);
        assert_eq!(model.relation_in, before.relation_in);
        assert_eq!(model.relation_out, before.relation_out);
    }

    #[test]
    fn test_update_keeps_constraints() {
        let mut model = hand_model(5.0);
        let mut sampler = ScriptedSampler::new(vec![Triplet::new(0, 0, 2)]);
        let outcome = model
            .train_on_triplet(&Triplet::new(1, 0, 2), &mut sampler)
            .unwrap();
        assert_eq!(outcome, StepOutcome::Updated);
        for e in 0..3 {
            assert!(l2_norm(model.entity_embedding(e).unwrap()) <= 1.0 + 1e-12);
        }
        assert!((l2_norm(model.relation_in(0).unwrap()) - 1.0).abs() < 1e-12);
        assert!((l2_norm(model.relation_out(0).unwrap()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_uses_pre_update_head() {
        let mut model = hand_model(5.0);
        let t = Triplet::new(1, 0, 2);
        let r_out_before = model.relation_out.row(0).to_owned();
        // diff = e1 ⊙ r - e2 ⊙ r = (0.6, 0.8) > 0, so g = (-1, -1)
        model.step(&t, 1.0);
        let e1 = model.entity.row(1).to_owned();
        let r_in = model.relation_in.row(0).to_owned();
        assert!((e1[0] - (0.5 - 0.1 * 0.6)).abs() < 1e-12);
        assert!((e1[1] - (0.5 - 0.1 * 0.8)).abs() < 1e-12);
        // r_in moves along the old head (0.5, 0.5), not the stepped one
        assert!((r_in[0] - (0.6 - 0.1 * 0.5)).abs() < 1e-12);
        assert!((r_in[1] - (0.8 - 0.1 * 0.5)).abs() < 1e-12);
        // tail: e2 -= α g ⊙ r_out  →  e2 + 0.1 * r_out
        let e2 = model.entity.row(2).to_owned();
        assert!((e2[0] - (-0.5 + 0.06)).abs() < 1e-12);
        // r_out never moves
        assert_eq!(model.relation_out.row(0), r_out_before);
    }

    #[test]
    fn test_init_satisfies_constraints() {
        let model = TranslationalModel::new(
            GraphShape::new(10, 3),
            &TranslationalConfig::default().with_dim(16),
        )
        .unwrap();
        for e in 0..10 {
            assert!(l2_norm(model.entity_embedding(e).unwrap()) <= 1.0 + 1e-12);
        }
        for r in 0..3 {
            assert!((l2_norm(model.relation_in(r).unwrap()) - 1.0).abs() < 1e-12);
            assert!((l2_norm(model.relation_out(r).unwrap()) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sampler_failure_propagates() {
        let mut model = hand_model(1.0);
        let mut empty = ScriptedSampler::new(Vec::new());
        let result = model.train_on_triplet(&Triplet::new(0, 0, 1), &mut empty);
        assert!(matches!(result, Err(Error::Sampler(_))));
    }

    #[test]
    fn test_from_tables_rejects_wrong_shape() {
        let result = TranslationalModel::from_tables(
            GraphShape::new(3, 1),
            &TranslationalConfig::default().with_dim(2),
            Array2::zeros((2, 2)),
            Array2::ones((1, 2)),
            Array2::ones((1, 2)),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}

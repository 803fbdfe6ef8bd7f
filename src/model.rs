//! The model-level abstraction shared by every latent embedding model.
//!
//! A model owns its parameter tables and exposes two operations to the
//! outside world: a pure [`ScoringModel::score`] and a single-triplet
//! training step [`ScoringModel::train_on_triplet`]. The epoch loop lives in
//! [`crate::training::Trainer`] and is generic over this trait; it never asks
//! which model it is driving.
//!
//! # Epoch protocol
//!
//! ```text
//! begin_epoch()                      // reset accumulators (EM only)
//! train_on_triplet(t) for t in data  // online update or E-step
//! end_epoch(is_final)                // merge accumulators (EM only)
//! ```
//!
//! Online models leave both hooks as no-ops: each step mutates the primary
//! tables immediately.

use crate::error::{Error, Result};
use crate::sampling::NegativeSampler;
use serde::{Deserialize, Serialize};

/// A fact `head --relation--> tail` over integer ids.
///
/// Identity is structural: two triplets are equal when all three ids are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triplet {
    /// Head entity.
    pub head: usize,
    /// Tail entity.
    pub tail: usize,
    /// Relation.
    pub relation: usize,
}

impl Triplet {
    /// Create a triplet from head, relation, tail.
    pub fn new(head: usize, relation: usize, tail: usize) -> Self {
        Self {
            head,
            tail,
            relation,
        }
    }

    /// Same relation and tail, different head.
    pub fn with_head(self, head: usize) -> Self {
        Self { head, ..self }
    }

    /// Same head and relation, different tail.
    pub fn with_tail(self, tail: usize) -> Self {
        Self { tail, ..self }
    }
}

/// Entity and relation counts, fixed for a model's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphShape {
    /// Number of entities; valid ids are `0..num_entities`.
    pub num_entities: usize,
    /// Number of relations; valid ids are `0..num_relations`.
    pub num_relations: usize,
}

impl GraphShape {
    pub fn new(num_entities: usize, num_relations: usize) -> Self {
        Self {
            num_entities,
            num_relations,
        }
    }

    /// Smallest shape that covers every id in `triplets`.
    pub fn covering(triplets: &[Triplet]) -> Self {
        let (mut entities, mut relations) = (0, 0);
        for t in triplets {
            entities = entities.max(t.head + 1).max(t.tail + 1);
            relations = relations.max(t.relation + 1);
        }
        Self::new(entities, relations)
    }

    #[inline]
    pub fn check_entity(&self, id: usize) -> Result<()> {
        if id < self.num_entities {
            Ok(())
        } else {
            Err(Error::EntityOutOfRange {
                id,
                count: self.num_entities,
            })
        }
    }

    #[inline]
    pub fn check_relation(&self, id: usize) -> Result<()> {
        if id < self.num_relations {
            Ok(())
        } else {
            Err(Error::RelationOutOfRange {
                id,
                count: self.num_relations,
            })
        }
    }

    /// Validate all three ids of a triplet.
    pub fn check(&self, triplet: &Triplet) -> Result<()> {
        self.check_entity(triplet.head)?;
        self.check_entity(triplet.tail)?;
        self.check_relation(triplet.relation)
    }

    pub(crate) fn ensure_non_empty(&self) -> Result<()> {
        if self.num_entities == 0 || self.num_relations == 0 {
            return Err(Error::InvalidConfig(format!(
                "graph must have at least one entity and one relation (got {} entities, {} relations)",
                self.num_entities, self.num_relations
            )));
        }
        Ok(())
    }
}

/// What a single training step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The pair was already separated by the margin; no parameter changed.
    Skipped,
    /// An online update was applied to the primary tables.
    Updated,
    /// An E-step contribution was recorded in the accumulators.
    Accumulated,
}

/// Link prediction result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted entity id.
    pub entity: usize,
    /// Model score (higher = more plausible).
    pub score: f64,
}

/// Common contract of every latent embedding model.
///
/// Models are driven strictly sequentially: no call observes a concurrent
/// mutation, so reads inside one `score` or `train_on_triplet` see a
/// consistent snapshot.
pub trait ScoringModel {
    /// Human-readable model name.
    fn name(&self) -> &'static str;

    /// Entity and relation counts the tables were built for.
    fn shape(&self) -> GraphShape;

    /// Vector dimension (topic count for the topic mixture).
    fn embedding_dim(&self) -> usize;

    /// Plausibility of a triplet; higher is better.
    ///
    /// Pure function of the current parameters. Fails only with
    /// [`Error::EntityOutOfRange`] / [`Error::RelationOutOfRange`].
    fn score(&self, triplet: &Triplet) -> Result<f64>;

    /// One training step on an observed true triplet.
    ///
    /// Margin models draw one negative from `sampler`; sampler errors are
    /// propagated unchanged.
    fn train_on_triplet(
        &mut self,
        triplet: &Triplet,
        sampler: &mut dyn NegativeSampler,
    ) -> Result<StepOutcome>;

    /// Epoch start. Batch models reset their accumulators here.
    fn begin_epoch(&mut self) {}

    /// Epoch end, after every triplet of the epoch was presented.
    /// Batch models merge their accumulators here.
    fn end_epoch(&mut self, _is_final: bool) {}

    /// Rank every entity as a tail for `(head, relation, ?)`.
    fn predict_tail(&self, head: usize, relation: usize, k: usize) -> Result<Vec<Prediction>> {
        let shape = self.shape();
        shape.check_entity(head)?;
        shape.check_relation(relation)?;
        let mut predictions = (0..shape.num_entities)
            .map(|tail| {
                self.score(&Triplet::new(head, relation, tail))
                    .map(|score| Prediction { entity: tail, score })
            })
            .collect::<Result<Vec<_>>>()?;
        rank(&mut predictions, k);
        Ok(predictions)
    }

    /// Rank every entity as a head for `(?, relation, tail)`.
    fn predict_head(&self, relation: usize, tail: usize, k: usize) -> Result<Vec<Prediction>> {
        let shape = self.shape();
        shape.check_relation(relation)?;
        shape.check_entity(tail)?;
        let mut predictions = (0..shape.num_entities)
            .map(|head| {
                self.score(&Triplet::new(head, relation, tail))
                    .map(|score| Prediction { entity: head, score })
            })
            .collect::<Result<Vec<_>>>()?;
        rank(&mut predictions, k);
        Ok(predictions)
    }
}

fn rank(predictions: &mut Vec<Prediction>, k: usize) {
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    predictions.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triplet_structural_identity() {
        let a = Triplet::new(0, 1, 2);
        let b = Triplet {
            head: 0,
            tail: 2,
            relation: 1,
        };
        assert_eq!(a, b);
        assert_ne!(a, a.with_tail(3));
        assert_eq!(a.with_head(5).head, 5);
        assert_eq!(a.with_head(5).tail, 2);
    }

    #[test]
    fn test_shape_checks() {
        let shape = GraphShape::new(3, 1);
        assert!(shape.check(&Triplet::new(0, 0, 2)).is_ok());
        assert!(matches!(
            shape.check(&Triplet::new(3, 0, 0)),
            Err(Error::EntityOutOfRange { id: 3, count: 3 })
        ));
        assert!(matches!(
            shape.check(&Triplet::new(0, 1, 0)),
            Err(Error::RelationOutOfRange { id: 1, count: 1 })
        ));
    }

    #[test]
    fn test_covering_shape() {
        let shape = GraphShape::covering(&[Triplet::new(0, 2, 4), Triplet::new(1, 0, 1)]);
        assert_eq!(shape, GraphShape::new(5, 3));
        assert_eq!(GraphShape::covering(&[]), GraphShape::new(0, 0));
    }
}

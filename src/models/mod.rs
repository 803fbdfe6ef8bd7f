//! Latent embedding models.
//!
//! | Model | Training | Score |
//! |-------|----------|-------|
//! | [`TopicMixtureModel`] | batch EM | Σₖ H·T·P / R |
//! | [`TranslationalModel`] | margin SGD | -‖e_h ⊙ r_in - e_t ⊙ r_out‖₁ |
//! | [`FactorModel`] | margin (ratio) SGD | negative KL, or Σh·Σt·exp(-‖h-t‖₁/σ) |
//! | [`EnsembleModel`] | per-factor margin SGD | Π over factors |

mod ensemble;
mod factor;
mod topic;
mod translational;

pub use ensemble::EnsembleModel;
pub use factor::{FactorModel, FactorTables};
pub use topic::TopicMixtureModel;
pub use translational::TranslationalModel;

use crate::error::{Error, Result};
use ndarray::{Array, Dimension, ShapeBuilder};
use rand_distr::{Distribution, Uniform};
use rand_xorshift::XorShiftRng;

/// Table of the given shape with entries drawn uniformly from `[low, high)`.
pub(crate) fn uniform_table<D, Sh>(
    shape: Sh,
    low: f64,
    high: f64,
    rng: &mut XorShiftRng,
) -> Result<Array<f64, D>>
where
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
{
    let dist = Uniform::new(low, high)
        .map_err(|e| Error::InvalidConfig(format!("uniform init [{low}, {high}): {e}")))?;
    Ok(Array::from_shape_simple_fn(shape, || dist.sample(&mut *rng)))
}

//! Vector primitives used by the scoring and update rules.
//!
//! All functions work on `ndarray` views so they apply equally to owned
//! vectors and to rows of a parameter table.

use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

/// Additive guard for denominators that may approach zero.
pub const EPSILON: f64 = 1e-100;

/// Elementwise sign with `sign(0) = 0`.
///
/// `f64::signum` maps `+0.0` to `1.0`, which would turn an exact match into a
/// nonzero subgradient.
pub fn sign(v: ArrayView1<'_, f64>) -> Array1<f64> {
    v.mapv(|x| {
        if x > 0.0 {
            1.0
        } else if x < 0.0 {
            -1.0
        } else {
            0.0
        }
    })
}

/// ||v||₁
#[inline]
pub fn l1_norm(v: ArrayView1<'_, f64>) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

/// ||v||₂
#[inline]
pub fn l2_norm(v: ArrayView1<'_, f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// ||a - b||₁
pub fn l1_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    Zip::from(&a)
        .and(&b)
        .fold(0.0, |acc, &x, &y| acc + (x - y).abs())
}

/// Rescale to unit L2 norm. A zero vector is left untouched.
pub fn normalize_l2(mut v: ArrayViewMut1<'_, f64>) {
    let norm = l2_norm(v.view());
    if norm > 0.0 {
        v.mapv_inplace(|x| x / norm);
    }
}

/// Project into the unit L2 ball: rescale only when the norm exceeds 1.
pub fn clip_to_unit_ball(mut v: ArrayViewMut1<'_, f64>) {
    let norm = l2_norm(v.view());
    if norm > 1.0 {
        v.mapv_inplace(|x| x / norm);
    }
}

/// Floor every entry at `floor`, then rescale to unit L2 norm.
pub fn floor_and_normalize(mut v: ArrayViewMut1<'_, f64>, floor: f64) {
    v.mapv_inplace(|x| x.max(floor));
    normalize_l2(v);
}

/// Elementwise `a / (b + EPSILON)`.
pub fn guarded_div(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    Zip::from(&a).and(&b).map_collect(|&x, &y| x / (y + EPSILON))
}

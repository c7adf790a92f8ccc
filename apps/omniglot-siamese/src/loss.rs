use tch::{Kind, Reduction, Tensor};

use crate::error::Result;

/// Floor under squared distances before `sqrt`, whose gradient is unbounded at 0.
const MIN_SQUARED_DISTANCE: f64 = 1e-12;

fn squared_euclidean(first: &Tensor, second: &Tensor) -> Result<Tensor> {
    let diff = first.f_sub(second)?;
    Ok(diff
        .f_mul(&diff)?
        .f_sum_dim_intlist([-1i64].as_slice(), false, None::<Kind>)?)
}

/// Contrastive loss on embedding pairs. `target` is 1 for a same-class pair
/// and 0 otherwise; different-class pairs are pushed at least `margin` apart.
pub fn contrastive_loss(
    first: &Tensor,
    second: &Tensor,
    target: &Tensor,
    margin: f64,
) -> Result<Tensor> {
    let squared = squared_euclidean(first, second)?;
    let distance = squared.f_clamp_min(MIN_SQUARED_DISTANCE)?.f_sqrt()?;
    let target = target.f_to_kind(squared.kind())?.f_view([-1])?;

    let similar = target.f_mul(&squared)?;
    let hinge = distance.f_neg()?.f_add_scalar(margin)?.f_clamp_min(0.0)?;
    let dissimilar = target
        .f_neg()?
        .f_add_scalar(1.0)?
        .f_mul(&hinge.f_mul(&hinge)?)?;

    Ok(similar.f_add(&dissimilar)?.f_mean(None::<Kind>)?)
}

/// Triplet loss: the anchor must be closer to the positive than to the
/// negative by at least `margin` (squared Euclidean distances).
pub fn triplet_loss(
    anchor: &Tensor,
    positive: &Tensor,
    negative: &Tensor,
    margin: f64,
) -> Result<Tensor> {
    let positive = squared_euclidean(anchor, positive)?;
    let negative = squared_euclidean(anchor, negative)?;
    Ok(positive
        .f_sub(&negative)?
        .f_add_scalar(margin)?
        .f_clamp_min(0.0)?
        .f_mean(None::<Kind>)?)
}

/// Mean binary cross-entropy between sigmoid predictions and 0/1 targets.
pub fn binary_cross_entropy(prediction: &Tensor, target: &Tensor) -> Result<Tensor> {
    let target = target.f_to_kind(prediction.kind())?.f_view_as(prediction)?;
    Ok(prediction.f_binary_cross_entropy(&target, None::<Tensor>, Reduction::Mean)?)
}

use tch::Tensor;

use crate::error::Result;

/// Element-wise distance applied between the two tower embeddings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    /// `|e1 - e2|`
    #[default]
    L1,
    /// `(e1 - e2)^2`
    SquaredL2,
}

impl DistanceKind {
    pub fn apply(self, first: &Tensor, second: &Tensor) -> Result<Tensor> {
        let diff = first.f_sub(second)?;
        let distance = match self {
            Self::L1 => diff.f_abs()?,
            Self::SquaredL2 => diff.f_mul(&diff)?,
        };
        Ok(distance)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::L1 => "l1_distance",
            Self::SquaredL2 => "squared_l2_distance",
        }
    }
}

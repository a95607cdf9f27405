// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::numeric::{STD_EPSILON, mean, population_std};

/// Affine map between original units and the standardized scale the
/// densities are evaluated on: `z = (y - loc) / scale`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Standardization {
    pub loc: f64,
    pub scale: f64,
}

impl Standardization {
    /// Empirical mean and population standard deviation of `values`.
    ///
    /// A constant series gets `scale = 1`.
    pub fn fit(values: &[f64]) -> Self {
        let loc = mean(values).unwrap_or(0.0);
        let scale = population_std(values)
            .filter(|std| std.is_finite() && *std >= STD_EPSILON)
            .unwrap_or(1.0);
        Self { loc, scale }
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .map(|value| (value - self.loc) / self.scale)
            .collect()
    }

    /// Level on the standardized scale back to original units.
    pub fn level(&self, z: f64) -> f64 {
        self.loc + self.scale * z
    }

    /// Spread on the standardized scale back to original units.
    pub fn spread(&self, z: f64) -> f64 {
        self.scale * z
    }
}

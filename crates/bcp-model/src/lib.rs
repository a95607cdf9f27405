// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod builder;
pub mod density;
pub mod mean_shift;
pub mod model;
pub mod positions;
pub mod prefix;
pub mod samples;
pub mod spec;
pub mod standardize;
pub mod trend_shift;
pub mod variance_shift;

pub use builder::{SINGLE_EDGE_MARGIN, build};
pub use density::LogDensity;
pub use mean_shift::MeanShiftModel;
pub use model::{ConditionalDensity, Model, Params};
pub use positions::PositionMap;
pub use samples::{ChangePointKind, Draw, PosteriorSampleSet, ScalarTrace, SegmentParams};
pub use spec::{ChangePointModelSpec, ModelVariant, PriorConfig};
pub use standardize::Standardization;
pub use trend_shift::TrendShiftModel;
pub use variance_shift::VarianceShiftModel;

/// Change-point model namespace.
pub fn crate_name() -> &'static str {
    let _ = bcp_core::crate_name();
    "bcp-model"
}

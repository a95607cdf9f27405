// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

/// How the change-point slots of a sample set are constrained.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangePointKind {
    /// One change point in `[lower, upper]`.
    Single { lower: usize, upper: usize },
    /// `k` ordered change points in `[min_dist, n - min_dist]`, pairwise at
    /// least `min_dist` apart.
    Ordered { k: usize, min_dist: usize },
}

impl ChangePointKind {
    pub const fn slots(self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Ordered { k, .. } => k,
        }
    }

    /// Minimum separation between extracted positions.
    pub const fn min_separation(self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Ordered { min_dist, .. } => min_dist,
        }
    }

    fn check_positions(self, positions: &[usize], n: usize) -> Result<(), String> {
        match self {
            Self::Single { lower, upper } => {
                let [tau] = positions else {
                    return Err(format!("expected 1 position, got {}", positions.len()));
                };
                if *tau < lower || *tau > upper {
                    return Err(format!("tau={tau} outside [{lower}, {upper}]"));
                }
            }
            Self::Ordered { k, min_dist } => {
                if positions.len() != k {
                    return Err(format!("expected {k} positions, got {}", positions.len()));
                }
                let upper = n.saturating_sub(min_dist);
                if let Some(&bad) = positions.iter().find(|&&p| p < min_dist || p > upper) {
                    return Err(format!("position {bad} outside [{min_dist}, {upper}]"));
                }
                if let Some(pair) = positions.windows(2).find(|pair| pair[1] < pair[0] + min_dist) {
                    return Err(format!(
                        "positions {} and {} closer than min_dist={min_dist}",
                        pair[0], pair[1]
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Segment parameters of one draw, in the series' original units.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum SegmentParams {
    MeanShift {
        means: Vec<f64>,
        sigma: f64,
    },
    /// Index 0 is before the change point; intercepts are at position 0.
    TrendShift {
        slopes: [f64; 2],
        intercepts: [f64; 2],
        sigma: f64,
    },
    VarianceShift {
        mean: f64,
        sigmas: [f64; 2],
    },
}

/// One retained posterior draw.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Draw {
    pub positions: Vec<usize>,
    pub segments: SegmentParams,
    pub log_density: f64,
}

/// Named scalar parameter with one trace per chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarTrace {
    pub name: String,
    pub chains: Vec<Vec<f64>>,
}

/// Retained draws of every chain. Immutable once built.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PosteriorSampleSet {
    kind: ChangePointKind,
    n: usize,
    chains: Vec<Vec<Draw>>,
}

impl PosteriorSampleSet {
    /// Validates and wraps per-chain draws for a series of length `n`.
    ///
    /// Rejects empty or ragged chain sets, draws whose positions break the
    /// support/ordering/spacing rules of `kind`, and segment parameters whose
    /// shape does not match `kind`.
    pub fn new(kind: ChangePointKind, n: usize, chains: Vec<Vec<Draw>>) -> Result<Self, BcpError> {
        let Some(first) = chains.first() else {
            return Err(BcpError::data("sample set needs at least one chain"));
        };
        let draws = first.len();
        if draws == 0 {
            return Err(BcpError::data("sample set needs at least one draw per chain"));
        }
        if let Some(chain) = chains.iter().position(|chain| chain.len() != draws) {
            return Err(BcpError::data(format!(
                "ragged sample set: chain 0 has {draws} draws, chain {chain} has {}",
                chains[chain].len()
            )));
        }

        for (chain_idx, chain) in chains.iter().enumerate() {
            for (draw_idx, draw) in chain.iter().enumerate() {
                kind.check_positions(&draw.positions, n)
                    .and_then(|()| check_segments(kind, &draw.segments))
                    .map_err(|reason| {
                        BcpError::data(format!(
                            "invalid draw at chain={chain_idx}, draw={draw_idx}: {reason}"
                        ))
                    })?;
            }
        }

        Ok(Self { kind, n, chains })
    }

    pub fn kind(&self) -> ChangePointKind {
        self.kind
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn num_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn draws_per_chain(&self) -> usize {
        self.chains[0].len()
    }

    pub fn total_draws(&self) -> usize {
        self.num_chains() * self.draws_per_chain()
    }

    pub fn chains(&self) -> &[Vec<Draw>] {
        &self.chains
    }

    /// All draws, chain-major.
    pub fn iter_draws(&self) -> impl Iterator<Item = &Draw> + '_ {
        self.chains.iter().flatten()
    }

    /// Flattened positions of one slot.
    pub fn slot_positions(&self, slot: usize) -> Vec<usize> {
        self.iter_draws()
            .filter_map(|draw| draw.positions.get(slot).copied())
            .collect()
    }

    /// Every monitored scalar: change-point slots first, then segment
    /// parameters, each traced per chain.
    pub fn scalar_traces(&self) -> Vec<ScalarTrace> {
        let names = scalar_names(self.kind, &self.chains[0][0].segments);
        let mut traces = names
            .into_iter()
            .map(|name| ScalarTrace {
                name,
                chains: vec![Vec::with_capacity(self.draws_per_chain()); self.num_chains()],
            })
            .collect::<Vec<_>>();

        for (chain_idx, chain) in self.chains.iter().enumerate() {
            for draw in chain {
                let values = draw
                    .positions
                    .iter()
                    .map(|&p| p as f64)
                    .chain(segment_scalars(&draw.segments));
                for (trace, value) in traces.iter_mut().zip(values) {
                    trace.chains[chain_idx].push(value);
                }
            }
        }
        traces
    }
}

fn check_segments(kind: ChangePointKind, segments: &SegmentParams) -> Result<(), String> {
    match (kind, segments) {
        (ChangePointKind::Ordered { k, .. }, SegmentParams::MeanShift { means, .. }) => {
            if means.len() != k + 1 {
                return Err(format!("expected {} segment means, got {}", k + 1, means.len()));
            }
            Ok(())
        }
        (
            ChangePointKind::Single { .. },
            SegmentParams::TrendShift { .. } | SegmentParams::VarianceShift { .. },
        ) => Ok(()),
        (kind, _) => Err(format!("segment parameters do not match {kind:?}")),
    }
}

fn scalar_names(kind: ChangePointKind, segments: &SegmentParams) -> Vec<String> {
    let mut names = match kind {
        ChangePointKind::Single { .. } => vec!["tau".to_string()],
        ChangePointKind::Ordered { k, .. } => (0..k).map(|slot| format!("tau[{slot}]")).collect(),
    };
    match segments {
        SegmentParams::MeanShift { means, .. } => {
            names.extend((0..means.len()).map(|idx| format!("mu[{idx}]")));
            names.push("sigma".to_string());
        }
        SegmentParams::TrendShift { .. } => {
            names.extend(
                ["slope[0]", "slope[1]", "intercept[0]", "intercept[1]", "sigma"]
                    .map(str::to_string),
            );
        }
        SegmentParams::VarianceShift { .. } => {
            names.extend(["mu", "sigma[0]", "sigma[1]"].map(str::to_string));
        }
    }
    names
}

fn segment_scalars(segments: &SegmentParams) -> Vec<f64> {
    match segments {
        SegmentParams::MeanShift { means, sigma } => {
            means.iter().copied().chain(std::iter::once(*sigma)).collect()
        }
        SegmentParams::TrendShift {
            slopes,
            intercepts,
            sigma,
        } => vec![slopes[0], slopes[1], intercepts[0], intercepts[1], *sigma],
        SegmentParams::VarianceShift { mean, sigmas } => vec![*mean, sigmas[0], sigmas[1]],
    }
}

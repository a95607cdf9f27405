// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;
use bcp_core::numeric::{STD_EPSILON, mean, sample_variance};
use bcp_model::PosteriorSampleSet;
use std::collections::BTreeMap;
use std::fmt;

const DEFAULT_RHAT_THRESHOLD: f64 = 1.1;
const DEFAULT_ESS_FLOOR_FRACTION: f64 = 0.1;
/// Chains shorter than this are not split in half.
const MIN_SPLIT_LEN: usize = 4;

/// Thresholds for [`diagnose`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnoseConfig {
    pub rhat_threshold: f64,
    /// ESS floor as a fraction of the nominal (total) draw count.
    pub ess_floor_fraction: f64,
}

impl Default for DiagnoseConfig {
    fn default() -> Self {
        Self {
            rhat_threshold: DEFAULT_RHAT_THRESHOLD,
            ess_floor_fraction: DEFAULT_ESS_FLOOR_FRACTION,
        }
    }
}

impl DiagnoseConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if !self.rhat_threshold.is_finite() || self.rhat_threshold < 1.0 {
            return Err(BcpError::invalid_config(format!(
                "DiagnoseConfig.rhat_threshold must be finite and >= 1.0; got {}",
                self.rhat_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.ess_floor_fraction) {
            return Err(BcpError::invalid_config(format!(
                "DiagnoseConfig.ess_floor_fraction must be in [0, 1]; got {}",
                self.ess_floor_fraction
            )));
        }
        Ok(())
    }
}

/// Convergence statistics of one monitored scalar.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterDiagnostics {
    pub rhat: f64,
    pub ess: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningIssue {
    HighRhat,
    LowEss,
}

/// Non-fatal signal that one parameter failed a convergence check.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceWarning {
    pub parameter: String,
    pub issue: WarningIssue,
    pub value: f64,
    pub threshold: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issue {
            WarningIssue::HighRhat => write!(
                f,
                "rhat for {} is {:.4}, above {}",
                self.parameter, self.value, self.threshold
            ),
            WarningIssue::LowEss => write!(
                f,
                "ess for {} is {:.1}, below {:.1}",
                self.parameter, self.value, self.threshold
            ),
        }
    }
}

/// Per-parameter diagnostics plus the overall verdict. Serializes with the
/// parameters flattened into the top-level object.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceReport {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub parameters: BTreeMap<String, ParameterDiagnostics>,
    pub converged: bool,
    pub warnings: Vec<ConvergenceWarning>,
}

impl ConvergenceReport {
    pub fn get(&self, parameter: &str) -> Option<ParameterDiagnostics> {
        self.parameters.get(parameter).copied()
    }

    /// Largest R-hat across parameters; `None` for an empty report.
    pub fn max_rhat(&self) -> Option<f64> {
        self.parameters
            .values()
            .map(|diag| diag.rhat)
            .reduce(f64::max)
    }

    pub fn min_ess(&self) -> Option<f64> {
        self.parameters.values().map(|diag| diag.ess).reduce(f64::min)
    }
}

/// Computes split R-hat and ESS for every monitored scalar of `samples`.
///
/// Always returns a report; failed checks become warnings and clear
/// `converged`.
pub fn diagnose(samples: &PosteriorSampleSet, config: &DiagnoseConfig) -> ConvergenceReport {
    let nominal = samples.total_draws() as f64;
    let ess_floor = config.ess_floor_fraction * nominal;
    let mut parameters = BTreeMap::new();
    let mut warnings = Vec::new();

    for trace in samples.scalar_traces() {
        let diag = ParameterDiagnostics {
            rhat: rhat(&trace.chains),
            ess: ess(&trace.chains),
        };
        if diag.rhat.is_nan() || diag.rhat > config.rhat_threshold {
            warnings.push(ConvergenceWarning {
                parameter: trace.name.clone(),
                issue: WarningIssue::HighRhat,
                value: diag.rhat,
                threshold: config.rhat_threshold,
            });
        }
        if diag.ess.is_nan() || diag.ess < ess_floor {
            warnings.push(ConvergenceWarning {
                parameter: trace.name.clone(),
                issue: WarningIssue::LowEss,
                value: diag.ess,
                threshold: ess_floor,
            });
        }
        parameters.insert(trace.name, diag);
    }

    for warning in &warnings {
        tracing::warn!(%warning, "convergence check failed");
    }
    ConvergenceReport {
        parameters,
        converged: warnings.is_empty(),
        warnings,
    }
}

/// Split-chain Gelman-Rubin statistic `sqrt(var_plus / W)`.
///
/// Returns 1.0 for a constant parameter and `+inf` when every chain is
/// constant but the chains disagree.
pub fn rhat(chains: &[Vec<f64>]) -> f64 {
    let sequences = split_chains(chains);
    let Some(parts) = VarianceParts::of(&sequences) else {
        return f64::NAN;
    };
    if parts.within_is_zero() {
        return if parts.between_is_zero() {
            1.0
        } else {
            f64::INFINITY
        };
    }
    (parts.var_plus / parts.within).sqrt()
}

/// Multi-chain effective sample size over split chains, truncating the
/// autocorrelation sum with Geyer's initial monotone positive pairs.
///
/// A constant parameter reports the nominal draw count; chains that are
/// individually constant but disagree report one draw per chain.
pub fn ess(chains: &[Vec<f64>]) -> f64 {
    let nominal = chains.iter().map(Vec::len).sum::<usize>() as f64;
    let sequences = split_chains(chains);
    let Some(parts) = VarianceParts::of(&sequences) else {
        return f64::NAN;
    };
    if parts.within_is_zero() {
        return if parts.between_is_zero() {
            nominal
        } else {
            chains.len() as f64
        };
    }

    let len = parts.len;
    let means = sequences
        .iter()
        .map(|seq| mean(seq).unwrap_or(0.0))
        .collect::<Vec<_>>();
    let autocorrelation = |lag: usize| -> f64 {
        if lag == 0 {
            return 1.0;
        }
        let mean_acov = sequences
            .iter()
            .zip(&means)
            .map(|(seq, &center)| autocovariance(seq, center, lag))
            .sum::<f64>()
            / sequences.len() as f64;
        1.0 - (parts.within - mean_acov) / parts.var_plus
    };

    let mut tau = -1.0;
    let mut previous_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < len {
        let pair = autocorrelation(lag) + autocorrelation(lag + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous_pair);
        tau += 2.0 * pair;
        previous_pair = pair;
        lag += 2;
    }

    let total = (sequences.len() * len) as f64;
    let tau = tau.max(1.0 / total.log10().max(1.0));
    total / tau
}

/// Between/within-sequence variance decomposition.
struct VarianceParts {
    len: usize,
    within: f64,
    between: f64,
    var_plus: f64,
    scale: f64,
}

impl VarianceParts {
    fn of(sequences: &[&[f64]]) -> Option<Self> {
        let len = sequences.first()?.len();
        if len == 0 || sequences.iter().any(|seq| seq.len() != len) {
            return None;
        }
        let means = sequences
            .iter()
            .map(|seq| mean(seq))
            .collect::<Option<Vec<_>>>()?;
        let within = sequences
            .iter()
            .map(|seq| sample_variance(seq).unwrap_or(0.0))
            .sum::<f64>()
            / sequences.len() as f64;
        let between = len as f64 * sample_variance(&means).unwrap_or(0.0);
        let grand_mean = mean(&means)?;
        let len_f = len as f64;
        Some(Self {
            len,
            within,
            between,
            var_plus: (len_f - 1.0) / len_f * within + between / len_f,
            scale: grand_mean.powi(2).max(1.0),
        })
    }

    fn within_is_zero(&self) -> bool {
        self.within <= STD_EPSILON * self.scale
    }

    fn between_is_zero(&self) -> bool {
        self.between <= STD_EPSILON * self.scale
    }
}

fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let mut sequences = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let len = chain.len();
        if len >= MIN_SPLIT_LEN {
            let half = len / 2;
            sequences.push(&chain[..half]);
            sequences.push(&chain[len - half..]);
        } else {
            sequences.push(chain.as_slice());
        }
    }
    sequences
}

/// Biased (divide-by-n) autocovariance at `lag`.
fn autocovariance(values: &[f64], center: f64, lag: usize) -> f64 {
    let n = values.len();
    if lag >= n {
        return 0.0;
    }
    values[..n - lag]
        .iter()
        .zip(&values[lag..])
        .map(|(a, b)| (a - center) * (b - center))
        .sum::<f64>()
        / n as f64
}

/// Diagnostics crate namespace.
pub fn crate_name() -> &'static str {
    let _ = (bcp_core::crate_name(), bcp_model::crate_name());
    "bcp-eval"
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Small numeric helpers shared by the model, diagnostics and summaries.

/// Standard deviations below this are treated as zero.
pub const STD_EPSILON: f64 = 1.0e-12;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased (n - 1) sample variance. `None` below two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let mut moments = RunningMoments::default();
    values.iter().for_each(|&value| moments.push(value));
    moments.sample_variance()
}

/// Population (n) standard deviation; used to standardize series.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mut moments = RunningMoments::default();
    values.iter().for_each(|&value| moments.push(value));
    moments.population_variance().map(f64::sqrt)
}

/// Welford accumulator for mean and variance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningMoments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn population_variance(&self) -> Option<f64> {
        (self.count > 0).then(|| self.m2 / self.count as f64)
    }
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped to `[0, 1]`; `sorted` must be ascending.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || q.is_nan() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Median of an unsorted slice.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, 0.5)
}

/// Most frequent value; ties go to the smallest.
pub fn mode_smallest(values: &[usize]) -> Option<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mut best: Option<(usize, usize)> = None;
    let mut idx = 0;
    while idx < sorted.len() {
        let value = sorted[idx];
        let run = sorted[idx..].iter().take_while(|&&v| v == value).count();
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((value, run));
        }
        idx += run;
    }
    best.map(|(value, _)| value)
}

/// Rounds to the nearest non-negative integer, ties to even.
pub fn round_half_even_index(value: f64) -> Option<usize> {
    if !value.is_finite() || value < -0.5 {
        return None;
    }
    let rounded = value.round_ties_even();
    if rounded > usize::MAX as f64 {
        return None;
    }
    Some(rounded.max(0.0) as usize)
}

/// `log(sum(exp(values)))` without overflow.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|value| (value - max).exp()).sum::<f64>().ln()
}

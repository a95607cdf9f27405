// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Warmup adaptation: dual-averaging step size and windowed diagonal metric.

const GAMMA: f64 = 0.05;
const T0: f64 = 10.0;
const KAPPA: f64 = 0.75;

const INIT_BUFFER: usize = 75;
const TERM_BUFFER: usize = 50;
const BASE_WINDOW: usize = 25;
/// Below this many tuning iterations only the step size adapts.
const MIN_TUNE_FOR_METRIC: usize = 20;

/// Nesterov dual averaging of `log(step_size)` toward a target acceptance.
#[derive(Clone, Debug, PartialEq)]
pub struct DualAveraging {
    target: f64,
    mu: f64,
    h_bar: f64,
    log_step: f64,
    log_step_bar: f64,
    counter: f64,
}

impl DualAveraging {
    pub fn new(target: f64, initial_step: f64) -> Self {
        let mut adapter = Self {
            target,
            mu: 0.0,
            h_bar: 0.0,
            log_step: 0.0,
            log_step_bar: 0.0,
            counter: 0.0,
        };
        adapter.restart(initial_step);
        adapter
    }

    /// Re-centres the search at `10 * step` and forgets history.
    pub fn restart(&mut self, step: f64) {
        self.mu = (10.0 * step).ln();
        self.h_bar = 0.0;
        self.log_step = step.ln();
        self.log_step_bar = 0.0;
        self.counter = 0.0;
    }

    /// Feeds one acceptance statistic; returns the next step size to use.
    pub fn update(&mut self, accept_stat: f64) -> f64 {
        let accept_stat = if accept_stat.is_finite() {
            accept_stat.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.counter += 1.0;
        let eta = 1.0 / (self.counter + T0);
        self.h_bar = (1.0 - eta) * self.h_bar + eta * (self.target - accept_stat);
        self.log_step = self.mu - self.counter.sqrt() / GAMMA * self.h_bar;
        let weight = self.counter.powf(-KAPPA);
        self.log_step_bar = weight * self.log_step + (1.0 - weight) * self.log_step_bar;
        self.log_step.exp()
    }

    /// Averaged step size used once tuning ends.
    pub fn final_step(&self) -> f64 {
        if self.counter == 0.0 {
            self.log_step.exp()
        } else {
            self.log_step_bar.exp()
        }
    }
}

/// Per-coordinate Welford accumulator for metric estimation.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagonalVariance {
    count: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl DiagonalVariance {
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub fn push(&mut self, theta: &[f64]) {
        self.count += 1;
        let count = self.count as f64;
        for ((mean, m2), &value) in self.mean.iter_mut().zip(&mut self.m2).zip(theta) {
            let delta = value - *mean;
            *mean += delta / count;
            *m2 += delta * (value - *mean);
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Variance shrunk toward `1e-3`, as Stan regularizes its metric.
    pub fn regularized(&self) -> Option<Vec<f64>> {
        if self.count < 3 {
            return None;
        }
        let n = self.count as f64;
        Some(
            self.m2
                .iter()
                .map(|m2| {
                    let var = m2 / (n - 1.0);
                    (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0))
                })
                .collect(),
        )
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.mean.iter_mut().for_each(|v| *v = 0.0);
        self.m2.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Warmup schedule: an initial fast buffer, doubling slow windows that
/// estimate the metric, and a terminal fast buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSchedule {
    slow_start: usize,
    window_ends: Vec<usize>,
}

impl WindowSchedule {
    pub fn new(tune: usize) -> Self {
        if tune < MIN_TUNE_FOR_METRIC {
            return Self {
                slow_start: tune,
                window_ends: vec![],
            };
        }

        let (init, term, base) = if INIT_BUFFER + TERM_BUFFER + BASE_WINDOW > tune {
            let init = (tune as f64 * 0.15) as usize;
            let term = (tune as f64 * 0.1) as usize;
            (init, term, tune - init - term)
        } else {
            (INIT_BUFFER, TERM_BUFFER, BASE_WINDOW)
        };

        let slow_end = tune - term;
        let mut window_ends = vec![];
        let mut start = init;
        let mut size = base;
        while start < slow_end {
            let mut end = start + size;
            // Stretch the last window when the next one would not fit.
            if end + 2 * size > slow_end {
                end = slow_end;
            }
            window_ends.push(end);
            start = end;
            size *= 2;
        }
        Self {
            slow_start: init,
            window_ends,
        }
    }

    /// First iteration that feeds the metric estimate.
    pub fn slow_start(&self) -> usize {
        self.slow_start
    }

    /// True when iteration `iteration` (0-based) closes a metric window.
    pub fn is_window_end(&self, iteration: usize) -> bool {
        self.window_ends.binary_search(&(iteration + 1)).is_ok()
    }

    pub fn window_ends(&self) -> &[usize] {
        &self.window_ends
    }
}

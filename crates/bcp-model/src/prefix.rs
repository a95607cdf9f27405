// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Count, sum and sum of squares over `[start, end)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SegmentMoments {
    pub count: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl SegmentMoments {
    /// `sum (z - level)^2` over the segment.
    pub fn rss(&self, level: f64) -> f64 {
        (self.sum_sq - 2.0 * level * self.sum + self.count * level * level).max(0.0)
    }
}

/// Prefix sums for O(1) segment moment queries.
#[derive(Clone, Debug, PartialEq)]
pub struct PrefixMoments {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl PrefixMoments {
    pub fn new(values: &[f64]) -> Self {
        let mut sum = Vec::with_capacity(values.len() + 1);
        let mut sum_sq = Vec::with_capacity(values.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        let (mut s1, mut s2) = (0.0, 0.0);
        for &value in values {
            s1 += value;
            s2 += value * value;
            sum.push(s1);
            sum_sq.push(s2);
        }
        Self { sum, sum_sq }
    }

    pub fn len(&self) -> usize {
        self.sum.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moments over `[start, end)`; an empty or inverted range is all zeros.
    pub fn range(&self, start: usize, end: usize) -> SegmentMoments {
        let end = end.min(self.len());
        if start >= end {
            return SegmentMoments::default();
        }
        SegmentMoments {
            count: (end - start) as f64,
            sum: self.sum[end] - self.sum[start],
            sum_sq: self.sum_sq[end] - self.sum_sq[start],
        }
    }
}

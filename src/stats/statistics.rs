// AccessCrab - GPL-3.0-or-later
// This file is part of AccessCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// AccessCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// AccessCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with AccessCrab.  If not, see <https://www.gnu.org/licenses/>.

//! Small descriptive statistics shared by the anomaly detectors.

/// Differences at or below this are treated as zero spread.
pub const EPSILON: f64 = 1e-10;

/// Mean and sample standard deviation of a population of counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub mean: f64,
    pub std_dev: f64,
}

impl Spread {
    /// `None` for fewer than two values.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let std_dev = sample_std_dev(values)?;
        Some(Self { mean, std_dev })
    }

    /// `(value - mean) / std_dev`, or `None` when there is no spread.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.std_dev <= EPSILON || !self.std_dev.is_finite() {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }

    pub const fn has_variance(&self) -> bool {
        self.std_dev > EPSILON
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with Bessel's correction (n - 1).
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((squared / (values.len() - 1) as f64).sqrt())
}

/// Quantile `q` in `[0, 1]` with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = sample_std_dev(&values).expect("enough values");
        assert!((std - 2.138_089_935).abs() < 1e-6);
        assert!(sample_std_dev(&[1.0]).is_none());
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert_eq!(quantile(&values, 0.75), Some(3.25));
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn test_zero_spread_has_no_z_score() {
        let spread = Spread::of(&[3.0, 3.0, 3.0]).expect("enough values");
        assert!(!spread.has_variance());
        assert!(spread.z_score(3.0).is_none());
    }
}

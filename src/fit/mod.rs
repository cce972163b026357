//! Attenuation fits of peak count against absorber thickness.
//!
//! Two models are available:
//!
//! * [`FitModel::Linear`] – `y = a·x + c`, closed-form weighted least squares.
//! * [`FitModel::Exponential`] – `y = a·exp(-b·x) + c`, Levenberg–Marquardt
//!   from a fixed starting point. `b` is the attenuation coefficient (1/mm).
//!
//! Each point is weighted by its Poisson counting uncertainty
//! `sigma = sqrt(count)`, floored at [`FitOptions::sigma_floor`] so a zero
//! count does not become an infinitely precise point.

pub mod aggregate;
mod exponential;
mod linear;

use serde::{Deserialize, Serialize};

use crate::config::FitOptions;
use crate::data::model::PeakTable;
use crate::error::{AttenuationError, Result};

/// Fewer points than this cannot constrain a fit.
pub const MIN_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitModel {
    Linear,
    #[default]
    Exponential,
}

/// Fitted parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitParams {
    Linear { slope: f64, intercept: f64 },
    Exponential { amplitude: f64, decay: f64, offset: f64 },
}

impl FitParams {
    /// Model prediction at thickness `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            FitParams::Linear { slope, intercept } => slope * x + intercept,
            FitParams::Exponential {
                amplitude,
                decay,
                offset,
            } => amplitude * (-decay * x).exp() + offset,
        }
    }

    pub fn model(&self) -> FitModel {
        match self {
            FitParams::Linear { .. } => FitModel::Linear,
            FitParams::Exponential { .. } => FitModel::Exponential,
        }
    }

    /// Parameters in declaration order: `(a, c)` or `(a, b, c)`.
    pub fn values(&self) -> Vec<f64> {
        match *self {
            FitParams::Linear { slope, intercept } => vec![slope, intercept],
            FitParams::Exponential {
                amplitude,
                decay,
                offset,
            } => vec![amplitude, decay, offset],
        }
    }
}

/// Outcome of fitting one material's peak table.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub material: String,
    pub params: FitParams,
    /// Solver iterations spent (0 for the closed-form linear fit).
    pub iterations: usize,
    /// Weighted sum of squared residuals at `params`.
    pub chi_square: f64,
    /// `[x, y]` at every whole millimetre from 0 to `floor(max thickness)`,
    /// see [`prediction_curve`].
    pub curve: Vec<[f64; 2]>,
}

impl FitResult {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.params.evaluate(x)
    }

    /// The attenuation coefficient `b`; only the exponential model has one.
    pub fn decay_rate(&self) -> Option<f64> {
        match self.params {
            FitParams::Exponential { decay, .. } => Some(decay),
            FitParams::Linear { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Weighted observations
// ---------------------------------------------------------------------------

/// Observations sorted by thickness, with one uncertainty per point.
#[derive(Debug, Clone)]
pub(crate) struct WeightedPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl WeightedPoints {
    pub fn from_table(table: &PeakTable, sigma_floor: f64) -> Self {
        let sorted = table.sorted_by_thickness();
        Self {
            x: sorted.iter().map(|r| r.thickness).collect(),
            y: sorted.iter().map(|r| r.peak_count as f64).collect(),
            sigma: sorted
                .iter()
                .map(|r| poisson_sigma(r.peak_count, sigma_floor))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.sigma)
            .map(|((&x, &y), &s)| (x, y, s))
    }

    /// Weighted sum of squared residuals under `params`.
    pub fn chi_square(&self, params: &FitParams) -> f64 {
        self.iter()
            .map(|(x, y, s)| ((y - params.evaluate(x)) / s).powi(2))
            .sum()
    }
}

/// Counting uncertainty `sqrt(count)`, never below `floor`.
pub fn poisson_sigma(count: u64, floor: f64) -> f64 {
    (count as f64).sqrt().max(floor)
}

/// Solver output before it is dressed up as a [`FitResult`].
#[derive(Debug)]
pub(crate) struct Solution {
    pub params: FitParams,
    pub iterations: usize,
    pub chi_square: f64,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Fit `model` to `table`. Insertion order of the table does not matter.
pub fn fit(table: &PeakTable, model: FitModel, options: &FitOptions) -> Result<FitResult> {
    if table.len() < MIN_POINTS {
        return Err(AttenuationError::Precision {
            points: table.len(),
            required: MIN_POINTS,
        });
    }

    let points = WeightedPoints::from_table(table, options.sigma_floor);
    let solution = match model {
        FitModel::Linear => linear::solve(&points)?,
        FitModel::Exponential => exponential::solve(&points, options)?,
    };

    let max_thickness = table.max_thickness().unwrap_or(0.0);
    Ok(FitResult {
        material: table.material().to_string(),
        curve: prediction_curve(&solution.params, max_thickness),
        params: solution.params,
        iterations: solution.iterations,
        chi_square: solution.chi_square,
    })
}

/// Upper bound on the number of points in a prediction curve.
pub const MAX_CURVE_POINTS: usize = 10_000;

/// Sample `params` at integer thicknesses `0..=floor(max_thickness)`. Past
/// [`MAX_CURVE_POINTS`] whole millimetres the same range is covered with
/// that many evenly spaced points instead.
pub fn prediction_curve(params: &FitParams, max_thickness: f64) -> Vec<[f64; 2]> {
    if !max_thickness.is_finite() || max_thickness < 0.0 {
        return Vec::new();
    }
    let whole = max_thickness.floor();
    let (points, step) = if whole < MAX_CURVE_POINTS as f64 {
        (whole as usize + 1, 1.0)
    } else {
        (MAX_CURVE_POINTS, whole / (MAX_CURVE_POINTS - 1) as f64)
    };
    (0..points)
        .map(|i| {
            let x = i as f64 * step;
            [x, params.evaluate(x)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::PeakRecord;
    use approx::assert_relative_eq;

    fn table_from(material: &str, points: &[(f64, u64)]) -> PeakTable {
        let mut table = PeakTable::new(material);
        for &(thickness, peak_count) in points {
            table.insert(PeakRecord { thickness, peak_count }).unwrap();
        }
        table
    }

    #[test]
    fn two_points_is_a_precision_error() {
        let table = table_from("Al", &[(0.0, 1000), (5.0, 400)]);
        for model in [FitModel::Linear, FitModel::Exponential] {
            let err = fit(&table, model, &FitOptions::default()).unwrap_err();
            assert!(matches!(err, AttenuationError::Precision { points: 2, required: 3 }));
        }
    }

    #[test]
    fn zero_counts_get_the_floor_sigma() {
        assert_eq!(poisson_sigma(0, 1.0), 1.0);
        assert_eq!(poisson_sigma(400, 1.0), 20.0);
    }

    #[test]
    fn curve_covers_whole_millimetres_up_to_max() {
        let params = FitParams::Linear { slope: 2.0, intercept: 1.0 };
        let curve = prediction_curve(&params, 10.01);
        assert_eq!(curve.len(), 11);
        assert_eq!(curve[0], [0.0, 1.0]);
        assert_eq!(curve[10], [10.0, 21.0]);
        assert!(prediction_curve(&params, f64::NAN).is_empty());
    }

    #[test]
    fn absurd_thickness_keeps_the_curve_bounded() {
        let params = FitParams::Exponential { amplitude: 1000.0, decay: 0.1, offset: 5.0 };
        let curve = prediction_curve(&params, 1e15);
        assert_eq!(curve.len(), MAX_CURVE_POINTS);
        assert_eq!(curve[0][0], 0.0);
        assert_relative_eq!(curve[MAX_CURVE_POINTS - 1][0], 1e15, max_relative = 1e-12);
        assert!(prediction_curve(&params, f64::INFINITY).is_empty());
    }

    #[test]
    fn exponential_fit_carries_material_and_curve() {
        let points: Vec<(f64, u64)> = (0..9)
            .map(|i| {
                let x = i as f64;
                (x, (1000.0 * (-0.5 * x).exp() + 10.0).round() as u64)
            })
            .collect();
        let result = fit(&table_from("Cu", &points), FitModel::Exponential, &FitOptions::default())
            .unwrap();

        assert_eq!(result.material, "Cu");
        assert_eq!(result.curve.len(), 9);
        assert_eq!(result.params.model(), FitModel::Exponential);
        let b = result.decay_rate().unwrap();
        assert_relative_eq!(b, 0.5, epsilon = 0.01);
        assert_relative_eq!(result.curve[2][1], result.evaluate(2.0));
    }

    #[test]
    fn linear_fit_has_no_decay_rate() {
        let table = table_from("Fe", &[(0.0, 5), (1.0, 8), (2.0, 11)]);
        let result = fit(&table, FitModel::Linear, &FitOptions::default()).unwrap();
        assert_eq!(result.decay_rate(), None);
        assert_eq!(result.params.values().len(), 2);
    }
}

use std::collections::BTreeMap;

use super::{FitResult, MAX_CURVE_POINTS};
use crate::error::{AttenuationError, Result};

// ---------------------------------------------------------------------------
// AttenuationModel – per-material decay rates, compared on one curve
// ---------------------------------------------------------------------------

/// Attenuation coefficient `b` (1/mm) for every successfully fitted
/// material. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttenuationModel {
    rates: BTreeMap<String, f64>,
}

impl AttenuationModel {
    /// Build from precomputed decay rates.
    pub fn aggregate(rates: BTreeMap<String, f64>) -> Self {
        Self { rates }
    }

    /// Collect the decay rate of every exponential fit. Fits without a decay
    /// rate (linear model) are skipped.
    pub fn from_fits<'a>(fits: impl IntoIterator<Item = &'a FitResult>) -> Self {
        let rates = fits
            .into_iter()
            .filter_map(|fit| Some((fit.material.clone(), fit.decay_rate()?)))
            .collect();
        Self { rates }
    }

    pub fn decay_rate(&self, material: &str) -> Result<f64> {
        self.rates
            .get(material)
            .copied()
            .ok_or_else(|| AttenuationError::Key {
                material: material.to_string(),
            })
    }

    /// Fraction of the unshielded signal left behind `x` mm: `exp(-b·x)`.
    /// Meant for `x ≥ 0`.
    pub fn proportion_remaining(&self, material: &str, x: f64) -> Result<f64> {
        Ok((-self.decay_rate(material)? * x).exp())
    }

    /// Thickness that halves the signal, `ln 2 / b`.
    pub fn half_value_layer(&self, material: &str) -> Result<f64> {
        Ok(std::f64::consts::LN_2 / self.decay_rate(material)?)
    }

    /// `[x, proportion]` from 0 to `x_max` in `step` mm increments. The step
    /// widens when it would take more than [`MAX_CURVE_POINTS`] points.
    pub fn curve(&self, material: &str, x_max: f64, step: f64) -> Result<Vec<[f64; 2]>> {
        let b = self.decay_rate(material)?;
        if step.is_nan() || step <= 0.0 || !x_max.is_finite() || x_max < 0.0 {
            return Ok(Vec::new());
        }
        let step = step.max(x_max / (MAX_CURVE_POINTS - 1) as f64);
        let n = (x_max / step).floor() as usize;
        Ok((0..=n)
            .map(|i| {
                let x = i as f64 * step;
                [x, (-b * x).exp()]
            })
            .collect())
    }

    /// Materials with a recorded rate, sorted by name.
    pub fn materials(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(name, b)| (name.as_str(), *b))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::FitParams;
    use approx::assert_relative_eq;

    fn model() -> AttenuationModel {
        AttenuationModel::aggregate(BTreeMap::from([
            ("Pb".to_string(), 0.1),
            ("Al".to_string(), 0.02),
        ]))
    }

    #[test]
    fn proportion_starts_at_one_and_decreases() {
        let model = model();
        assert_eq!(model.proportion_remaining("Pb", 0.0).unwrap(), 1.0);

        let mut previous = 1.0;
        for i in 1..50 {
            let p = model.proportion_remaining("Pb", i as f64 * 0.5).unwrap();
            assert!(p < previous);
            previous = p;
        }
        assert_relative_eq!(model.proportion_remaining("Pb", 10.0).unwrap(), (-1.0f64).exp());
    }

    #[test]
    fn unknown_material_is_a_key_error() {
        let err = model().proportion_remaining("Cu", 1.0).unwrap_err();
        assert!(matches!(err, AttenuationError::Key { material } if material == "Cu"));
    }

    #[test]
    fn half_value_layer_halves() {
        let model = model();
        let hvl = model.half_value_layer("Al").unwrap();
        assert_relative_eq!(model.proportion_remaining("Al", hvl).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn curve_is_sampled_at_step() {
        let curve = model().curve("Pb", 2.0, 0.5).unwrap();
        assert_eq!(curve.len(), 5);
        assert_eq!(curve[0], [0.0, 1.0]);
        assert_eq!(curve[4][0], 2.0);

        let coarse = model().curve("Pb", 1e9, 0.01).unwrap();
        assert!(coarse.len() <= MAX_CURVE_POINTS);
    }

    #[test]
    fn linear_fits_are_left_out() {
        let exp = FitResult {
            material: "Pb".to_string(),
            params: FitParams::Exponential { amplitude: 1.0, decay: 0.3, offset: 0.0 },
            iterations: 4,
            chi_square: 0.0,
            curve: Vec::new(),
        };
        let lin = FitResult {
            material: "Cu".to_string(),
            params: FitParams::Linear { slope: -1.0, intercept: 10.0 },
            iterations: 0,
            chi_square: 0.0,
            curve: Vec::new(),
        };

        let model = AttenuationModel::from_fits([&exp, &lin]);
        assert_eq!(model.len(), 1);
        assert_eq!(model.decay_rate("Pb").unwrap(), 0.3);
        assert!(model.decay_rate("Cu").is_err());
        assert_eq!(model.materials().collect::<Vec<_>>(), vec![("Pb", 0.3)]);
    }
}

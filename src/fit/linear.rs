use nalgebra::{Matrix2, Vector2};

use super::{FitParams, Solution, WeightedPoints};
use crate::error::{AttenuationError, Result};

/// Threshold for considering the normal matrix singular
const DETERMINANT_EPSILON: f64 = 1e-12;

/// Weighted least squares for `y = a·x + c` with weights `1/sigma²`.
pub(super) fn solve(points: &WeightedPoints) -> Result<Solution> {
    let mut normal = Matrix2::zeros();
    let mut rhs = Vector2::zeros();
    for (x, y, sigma) in points.iter() {
        let w = 1.0 / (sigma * sigma);
        let row = Vector2::new(x, 1.0);
        normal += w * row * row.transpose();
        rhs += w * y * row;
    }

    // Scale-free singularity test: all thicknesses equal makes det vanish
    // relative to the diagonal product.
    let det = normal.determinant();
    if det.abs() <= DETERMINANT_EPSILON * normal[(0, 0)] * normal[(1, 1)] {
        return Err(AttenuationError::Convergence {
            iterations: 0,
            reason: "all thickness values coincide, slope is undetermined".to_string(),
        });
    }
    let solution = normal
        .lu()
        .solve(&rhs)
        .ok_or_else(|| AttenuationError::Convergence {
            iterations: 0,
            reason: format!("singular normal matrix (det={det:.3e})"),
        })?;

    let params = FitParams::Linear {
        slope: solution[0],
        intercept: solution[1],
    };
    Ok(Solution {
        chi_square: points.chi_square(&params),
        params,
        iterations: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{PeakRecord, PeakTable};
    use approx::assert_relative_eq;

    fn points(pairs: &[(f64, u64)]) -> WeightedPoints {
        let mut table = PeakTable::new("test");
        for &(thickness, peak_count) in pairs {
            table.insert(PeakRecord { thickness, peak_count }).unwrap();
        }
        WeightedPoints::from_table(&table, 1.0)
    }

    #[test]
    fn recovers_exact_line() {
        let data: Vec<(f64, u64)> = (0..=10).map(|x| (x as f64, 3 * x + 5)).collect();
        let solution = solve(&points(&data)).unwrap();

        match solution.params {
            FitParams::Linear { slope, intercept } => {
                assert_relative_eq!(slope, 3.0, epsilon = 1e-9);
                assert_relative_eq!(intercept, 5.0, epsilon = 1e-9);
            }
            other => panic!("unexpected params {other:?}"),
        }
        assert!(solution.chi_square < 1e-12);
    }

    #[test]
    fn order_of_points_does_not_matter() {
        let forward = solve(&points(&[(0.0, 100), (1.0, 80), (2.0, 50), (3.0, 45)])).unwrap();
        let shuffled = solve(&points(&[(2.0, 50), (0.0, 100), (3.0, 45), (1.0, 80)])).unwrap();
        let (f, s) = (forward.params.values(), shuffled.params.values());
        assert_relative_eq!(f[0], s[0], epsilon = 1e-9);
        assert_relative_eq!(f[1], s[1], epsilon = 1e-9);
    }

    #[test]
    fn zero_counts_keep_the_fit_finite() {
        let solution = solve(&points(&[(0.0, 0), (1.0, 0), (2.0, 0)])).unwrap();
        let values = solution.params.values();
        assert_relative_eq!(values[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(values[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn coincident_thicknesses_are_rejected() {
        let weighted = WeightedPoints {
            x: vec![2.0, 2.0, 2.0],
            y: vec![10.0, 12.0, 11.0],
            sigma: vec![1.0, 1.0, 1.0],
        };
        assert!(matches!(
            solve(&weighted),
            Err(AttenuationError::Convergence { iterations: 0, .. })
        ));
    }
}

use serde::{Deserialize, Serialize};

use super::model::EnergyAxis;

/// Affine channel → energy map: `energy = channel * slope_kev + intercept_kev`.
///
/// The default intercept is the sum of the two offsets measured for the
/// detector (7.60 keV and 14.68 keV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub slope_kev: f64,
    pub intercept_kev: f64,
}

impl Calibration {
    pub const DEFAULT_SLOPE_KEV: f64 = 0.82;
    pub const DEFAULT_INTERCEPT_KEV: f64 = 22.28;

    pub const fn new(slope_kev: f64, intercept_kev: f64) -> Self {
        Self {
            slope_kev,
            intercept_kev,
        }
    }

    /// Energy of a single channel.
    pub fn energy(&self, channel: usize) -> f64 {
        channel as f64 * self.slope_kev + self.intercept_kev
    }

    /// Energy axis for a spectrum with `len` channels.
    pub fn calibrate(&self, len: usize) -> EnergyAxis {
        EnergyAxis::from_energies((0..len).map(|i| self.energy(i)).collect())
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLOPE_KEV, Self::DEFAULT_INTERCEPT_KEV)
    }
}

/// Energy axis under the default detector calibration.
pub fn calibrate(len: usize) -> EnergyAxis {
    Calibration::default().calibrate(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn first_channel_is_the_intercept() {
        let axis = calibrate(1024);
        assert_eq!(axis.len(), 1024);
        assert_eq!(axis.energies()[0], 22.28);
        assert_relative_eq!(axis.energies()[1023], 1023.0 * 0.82 + 22.28);
    }

    #[test]
    fn zero_length_gives_empty_axis() {
        assert!(calibrate(0).is_empty());
    }

    #[test]
    fn custom_calibration() {
        let axis = Calibration::new(2.0, -1.0).calibrate(3);
        assert_eq!(axis.energies(), &[-1.0, 1.0, 3.0]);
    }

    proptest! {
        #[test]
        fn axis_is_linear_and_increasing(len in 2usize..4096) {
            let axis = calibrate(len);
            for pair in axis.energies().windows(2) {
                prop_assert!(pair[1] > pair[0]);
                prop_assert!((pair[1] - pair[0] - 0.82).abs() < 1e-9);
            }
        }
    }
}

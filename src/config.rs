use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::calibration::Calibration;
use crate::data::model::PeakWindow;
use crate::fit::FitModel;

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// How the y-axis of count plots is drawn. Has no effect on fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    #[default]
    Log,
}

/// Solver settings for the attenuation fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Starting `(a, b, c)` for the exponential model.
    pub initial_guess: [f64; 3],
    pub max_iterations: usize,
    /// Relative chi-square / step tolerance that counts as converged. The
    /// decay-rate search stops once its bracket on `ln b` is narrower than
    /// `sqrt(tolerance)`.
    pub tolerance: f64,
    /// Lower bound on a point's uncertainty, so zero counts keep finite weight.
    pub sigma_floor: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial_guess: [1000.0, 1.0, 0.0],
            max_iterations: 200,
            tolerance: 1e-10,
            sigma_floor: 1.0,
        }
    }
}

/// Everything that parameterizes a reduction run. Energies in keV,
/// thicknesses in mm, window bounds in channels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration: Calibration,
    pub window: PeakWindow,
    pub model: FitModel,
    pub scale: Scale,
    pub fit: FitOptions,
}

// ---------------------------------------------------------------------------
// Run manifest – which files belong to which material
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub thickness_mm: f64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    pub samples: Vec<SampleEntry>,
}

/// A complete run description as read from JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Where peak listings are written; `None` skips writing them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub materials: Vec<MaterialEntry>,
}

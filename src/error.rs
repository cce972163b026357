use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::PeakWindow;

// ---------------------------------------------------------------------------
// AttenuationError – every failure the reduction pipeline can produce
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum AttenuationError {
    /// A count file or peak listing contained a line that is not what we expect.
    #[error("{source_name}, line {line}: cannot parse '{content}'")]
    Format {
        source_name: String,
        line: usize,
        content: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The peak window does not fit inside the spectrum. This is a
    /// configuration error; the window is never truncated.
    #[error("peak window {window} does not fit a spectrum of {len} channels")]
    Range { window: PeakWindow, len: usize },

    #[error("thickness {thickness} mm appears more than once")]
    DuplicateKey { thickness: f64 },

    #[error("{points} data points supplied, at least {required} are needed for a fit")]
    Precision { points: usize, required: usize },

    #[error("fit did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },

    #[error("no attenuation coefficient recorded for material '{material}'")]
    Key { material: String },
}

pub type Result<T> = std::result::Result<T, AttenuationError>;

impl AttenuationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AttenuationError::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// MaterialError – an AttenuationError tagged with where it happened
// ---------------------------------------------------------------------------

/// A failure while reducing one material, carrying the material name and,
/// when known, the sample (thickness or file) that triggered it.
#[derive(Error, Debug)]
#[error("material '{material}'{}: {source}", sample_note(.sample))]
pub struct MaterialError {
    pub material: String,
    pub sample: Option<String>,
    #[source]
    pub source: AttenuationError,
}

impl MaterialError {
    pub fn new(material: &str, source: AttenuationError) -> Self {
        Self {
            material: material.to_string(),
            sample: None,
            source,
        }
    }

    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    /// Too few points to fit: the material is reported with degraded
    /// confidence instead of as a hard failure.
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, AttenuationError::Precision { .. })
    }
}

fn sample_note(sample: &Option<String>) -> String {
    match sample {
        Some(sample) => format!(" ({sample})"),
        None => String::new(),
    }
}

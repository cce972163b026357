//! Reduction of gamma-ray transmission measurements into attenuation
//! coefficients.
//!
//! For each shielding material a series of spectra taken behind increasing
//! absorber thickness is calibrated to energy, reduced to the highest count
//! inside a fixed photopeak window and fitted with a count-vs-thickness
//! model. The decay rates of all materials are then compared through an
//! [`fit::aggregate::AttenuationModel`].

pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod pipeline;

pub use config::{FitOptions, PipelineConfig, RunManifest, Scale};
pub use error::{AttenuationError, MaterialError, Result};
pub use fit::{FitModel, FitParams, FitResult};

//! Spectra → peak tables → fits → attenuation model.
//!
//! Materials are independent: a failure in one is recorded in the
//! [`RunReport`] and the others carry on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::{PipelineConfig, RunManifest};
use crate::data::loader::load_material;
use crate::data::model::{EnergyAxis, MaterialSamples, PeakTable, WindowTrace};
use crate::data::peaks::{build_table, save_listing};
use crate::error::{AttenuationError, MaterialError};
use crate::fit::aggregate::AttenuationModel;
use crate::fit::{fit, FitResult};

/// The peak region of one sample, kept for plotting after the full
/// spectrum has been dropped.
#[derive(Debug, Clone)]
pub struct SampleTrace {
    pub thickness: f64,
    pub label: String,
    pub window: WindowTrace,
}

/// Everything derived for one material.
#[derive(Debug, Clone)]
pub struct MaterialReduction {
    pub table: PeakTable,
    pub traces: Vec<SampleTrace>,
    /// `None` when the fit failed; the reason is in [`RunReport::failures`].
    pub fit: Option<FitResult>,
}

impl MaterialReduction {
    pub fn material(&self) -> &str {
        self.table.material()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub config: PipelineConfig,
    pub reductions: Vec<MaterialReduction>,
    pub failures: Vec<MaterialError>,
    pub model: AttenuationModel,
}

impl RunReport {
    pub fn reduction(&self, material: &str) -> Option<&MaterialReduction> {
        self.reductions.iter().find(|r| r.material() == material)
    }

    pub fn fits(&self) -> impl Iterator<Item = &FitResult> {
        self.reductions.iter().filter_map(|r| r.fit.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Per-material stages
// ---------------------------------------------------------------------------

/// Build the peak table and windowed traces for one material. Energy axes
/// are calibrated once per distinct spectrum length and shared through
/// `axes`.
pub fn tabulate(
    material: &MaterialSamples,
    config: &PipelineConfig,
    axes: &mut BTreeMap<usize, EnergyAxis>,
) -> Result<(PeakTable, Vec<SampleTrace>), MaterialError> {
    let table = build_table(material, &config.window)?;

    let traces = material
        .samples
        .iter()
        .map(|sample| {
            let axis = axes
                .entry(sample.spectrum.len())
                .or_insert_with(|| config.calibration.calibrate(sample.spectrum.len()));
            let window = axis
                .window_slice(&sample.spectrum, &config.window)
                .map_err(|e| {
                    MaterialError::new(&material.name, e)
                        .with_sample(format!("{} mm, {}", sample.thickness, sample.label))
                })?;
            Ok(SampleTrace {
                thickness: sample.thickness,
                label: sample.label.clone(),
                window,
            })
        })
        .collect::<Result<Vec<_>, MaterialError>>()?;

    Ok((table, traces))
}

/// Fit the configured model to a material's table.
pub fn fit_table(table: &PeakTable, config: &PipelineConfig) -> Result<FitResult, MaterialError> {
    let result = fit(table, config.model, &config.fit)
        .map_err(|e| MaterialError::new(table.material(), e))?;
    log::info!(
        "{}: {:?} fit {:?} ({} iterations, chi2 {:.3})",
        result.material,
        config.model,
        result.params,
        result.iterations,
        result.chi_square
    );
    Ok(result)
}

fn record_failure(failures: &mut Vec<MaterialError>, err: MaterialError) {
    if err.is_degraded() {
        log::warn!("{err} (no fit, degraded confidence)");
    } else {
        log::error!("{err}");
    }
    failures.push(err);
}

// ---------------------------------------------------------------------------
// Whole runs
// ---------------------------------------------------------------------------

/// Reduce already loaded materials. When `listing_dir` is given it is
/// created if needed and each peak table is written there as
/// `<material>_peaks.txt`; a directory or write failure is recorded against
/// the material like any other.
pub fn run(
    materials: impl IntoIterator<Item = MaterialSamples>,
    config: &PipelineConfig,
    listing_dir: Option<&Path>,
) -> RunReport {
    let mut report = RunReport {
        config: config.clone(),
        ..RunReport::default()
    };
    let mut axes = BTreeMap::new();
    let mut listings = BTreeSet::new();

    for material in materials {
        let (table, traces) = match tabulate(&material, config, &mut axes) {
            Ok(tabulated) => tabulated,
            Err(err) => {
                record_failure(&mut report.failures, err);
                continue;
            }
        };
        // The spectra are no longer needed past this point.
        drop(material);

        if let Some(dir) = listing_dir {
            let path = unique_listing_path(dir, table.material(), &mut listings);
            let written = std::fs::create_dir_all(dir)
                .map_err(|e| AttenuationError::io(dir, e))
                .and_then(|()| save_listing(&table, &path));
            match written {
                Ok(()) => log::debug!("wrote {}", path.display()),
                Err(err) => {
                    record_failure(&mut report.failures, MaterialError::new(table.material(), err))
                }
            }
        }

        let fit = match fit_table(&table, config) {
            Ok(result) => Some(result),
            Err(err) => {
                record_failure(&mut report.failures, err);
                None
            }
        };
        report.reductions.push(MaterialReduction { table, traces, fit });
    }

    report.model = AttenuationModel::from_fits(report.fits());
    report
}

/// Load and reduce every material of a manifest.
pub fn run_manifest(manifest: &RunManifest) -> RunReport {
    let mut failures = Vec::new();
    let mut materials = Vec::with_capacity(manifest.materials.len());
    for entry in &manifest.materials {
        match load_material(entry) {
            Ok(material) => materials.push(material),
            Err(err) => record_failure(&mut failures, err),
        }
    }

    let mut report = run(materials, &manifest.pipeline, manifest.output_dir.as_deref());
    failures.append(&mut report.failures);
    report.failures = failures;
    report
}

/// File name for a material's peak listing.
pub fn listing_path(dir: &Path, material: &str) -> PathBuf {
    let stem: String = material
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{stem}_peaks.txt"))
}

/// [`listing_path`], suffixed `_2`, `_3`, … when an earlier material of the
/// same run already claimed that file.
fn unique_listing_path(dir: &Path, material: &str, taken: &mut BTreeSet<PathBuf>) -> PathBuf {
    let mut path = listing_path(dir, material);
    let mut n = 1;
    while taken.contains(&path) {
        n += 1;
        path = listing_path(dir, &format!("{material}_{n}"));
    }
    if n > 1 {
        log::warn!(
            "{material}: listing name collides with another material, writing {}",
            path.display()
        );
    }
    taken.insert(path.clone());
    path
}

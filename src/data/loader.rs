use std::path::{Path, PathBuf};

use super::model::{MaterialSamples, Sample, Spectrum};
use crate::config::{MaterialEntry, RunManifest};
use crate::error::{AttenuationError, MaterialError, Result};

// ---------------------------------------------------------------------------
// Count files
// ---------------------------------------------------------------------------

/// Parse a count file: one non-negative integer per line, line number =
/// channel. Surrounding whitespace and blank lines at the end are tolerated,
/// anything else that is not an integer is a `Format` error.
pub fn parse_counts(source_name: &str, text: &str) -> Result<Spectrum> {
    let body = text.trim_end();
    if body.is_empty() {
        return Ok(Spectrum::new(Vec::new()));
    }
    body.lines()
        .enumerate()
        .map(|(idx, line)| {
            line.trim()
                .parse::<u64>()
                .map_err(|_| AttenuationError::Format {
                    source_name: source_name.to_string(),
                    line: idx + 1,
                    content: line.to_string(),
                })
        })
        .collect::<Result<Vec<u64>>>()
        .map(Spectrum::new)
}

/// Load one spectrum from a count file.
pub fn load_counts(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path).map_err(|e| AttenuationError::io(path, e))?;
    parse_counts(&path.display().to_string(), &text)
}

// ---------------------------------------------------------------------------
// Run manifests
// ---------------------------------------------------------------------------

/// Read a JSON run manifest. Relative sample paths are resolved against the
/// manifest's own directory.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    let text = std::fs::read_to_string(path).map_err(|e| AttenuationError::io(path, e))?;
    let mut manifest: RunManifest =
        serde_json::from_str(&text).map_err(|source| AttenuationError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for material in &mut manifest.materials {
        for sample in &mut material.samples {
            sample.path = resolve(base, &sample.path);
        }
    }
    if let Some(dir) = manifest.output_dir.take() {
        manifest.output_dir = Some(resolve(base, &dir));
    }
    Ok(manifest)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Load every spectrum listed for one material.
pub fn load_material(entry: &MaterialEntry) -> std::result::Result<MaterialSamples, MaterialError> {
    let samples = entry
        .samples
        .iter()
        .map(|sample| {
            let spectrum = load_counts(&sample.path).map_err(|e| {
                MaterialError::new(&entry.name, e).with_sample(format!(
                    "{} mm, {}",
                    sample.thickness_mm,
                    sample.path.display()
                ))
            })?;
            Ok(Sample {
                thickness: sample.thickness_mm,
                label: sample.path.display().to_string(),
                spectrum,
            })
        })
        .collect::<std::result::Result<Vec<_>, MaterialError>>()?;

    log::info!("Loaded {} spectra for {}", samples.len(), entry.name);
    Ok(MaterialSamples {
        name: entry.name.clone(),
        samples,
    })
}

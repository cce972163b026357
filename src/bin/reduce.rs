//! Headless reduction: `reduce <manifest.json>`.
//!
//! Writes each material's peak listing into the manifest's `output_dir`
//! (when set) and logs the fitted parameters and attenuation coefficients.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use rusty_gamma::data::loader::load_manifest;
use rusty_gamma::pipeline::run_manifest;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: reduce <manifest.json>");
    };
    let manifest =
        load_manifest(&path).with_context(|| format!("loading manifest {}", path.display()))?;

    let report = run_manifest(&manifest);

    for (material, b) in report.model.materials() {
        let hvl = report.model.half_value_layer(material)?;
        log::info!("{material}: attenuation coefficient {b:.4} /mm, half-value layer {hvl:.2} mm");
    }

    let fatal = report.failures.iter().filter(|e| !e.is_degraded()).count();
    if fatal > 0 {
        bail!("{fatal} material(s) failed, see log above");
    }
    Ok(())
}

//! Writes a synthetic 22Na transmission data set to `sample_data/`:
//! one count file per (material, thickness) plus `manifest.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusty_gamma::config::{MaterialEntry, RunManifest, SampleEntry};
use rusty_gamma::data::calibration::Calibration;

const CHANNELS: usize = 1024;
const PHOTOPEAK_KEV: f64 = 511.0;
const PEAK_WIDTH_CHANNELS: f64 = 18.0;
const UNSHIELDED_PEAK: f64 = 50_000.0;
const PLATES: u32 = 9;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Photopeak on a falling Compton continuum, attenuated by `transmission`.
fn generate_spectrum(peak_channel: f64, transmission: f64, rng: &mut SimpleRng) -> Vec<u64> {
    (0..CHANNELS)
        .map(|ch| {
            let x = ch as f64;
            let continuum = 3_000.0 * (-x / 250.0).exp() + 40.0;
            let peak = gaussian(x, peak_channel, PEAK_WIDTH_CHANNELS, UNSHIELDED_PEAK);
            let expected = (continuum + peak) * transmission;
            rng.poisson_like(expected)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Counting noise: normal approximation to Poisson(`mean`), never negative.
    fn poisson_like(&mut self, mean: f64) -> u64 {
        self.gauss(mean, mean.sqrt()).round().max(0.0) as u64
    }
}

fn write_counts(path: &Path, counts: &[u64]) -> Result<()> {
    let text: String = counts.iter().map(|c| format!("{c}\n")).collect();
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let out = PathBuf::from("sample_data");

    let calibration = Calibration::default();
    let peak_channel = (PHOTOPEAK_KEV - calibration.intercept_kev) / calibration.slope_kev;

    // (name, attenuation coefficient at 511 keV in 1/mm, plate thickness in mm)
    let materials: [(&str, f64, f64); 3] = [
        ("Pb", 0.17, 1.0),
        ("Cu", 0.073, 2.0),
        ("Al", 0.023, 5.0),
    ];

    let mut manifest = RunManifest {
        output_dir: Some(PathBuf::from("peaks")),
        ..RunManifest::default()
    };

    for (name, mu, step) in materials {
        let dir = out.join(name);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut samples = Vec::new();
        for plate in 0..PLATES {
            let thickness = f64::from(plate) * step;
            let counts = generate_spectrum(peak_channel, (-mu * thickness).exp(), &mut rng);
            let relative = PathBuf::from(name).join(format!("{thickness}mm.dat"));
            write_counts(&out.join(&relative), &counts)?;
            samples.push(SampleEntry {
                thickness_mm: thickness,
                path: relative,
            });
        }
        manifest.materials.push(MaterialEntry {
            name: name.to_string(),
            samples,
        });
    }

    let manifest_path = out.join("manifest.json");
    let json = serde_json::to_string_pretty(&manifest).context("serializing manifest")?;
    std::fs::write(&manifest_path, json)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    println!(
        "Wrote {} materials × {} thicknesses ({CHANNELS} channels each); manifest at {}",
        materials.len(),
        PLATES,
        manifest_path.display()
    );
    Ok(())
}

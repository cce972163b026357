use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::model::{MaterialSamples, PeakRecord, PeakTable, PeakWindow, Spectrum};
use crate::error::{AttenuationError, MaterialError, Result};

// ---------------------------------------------------------------------------
// Peak extraction
// ---------------------------------------------------------------------------

/// Highest count inside `window`. Counts outside the window never matter.
pub fn extract_peak(spectrum: &Spectrum, window: &PeakWindow) -> Result<u64> {
    let range = window.checked_range(spectrum.len())?;
    // checked_range guarantees a non-empty slice
    Ok(spectrum.counts()[range].iter().copied().max().unwrap_or(0))
}

/// Reduce every sample of a material to its peak count.
///
/// Fails on the first sample whose spectrum is too short for the window or
/// whose thickness was already seen; the error names that sample.
pub fn build_table(
    material: &MaterialSamples,
    window: &PeakWindow,
) -> std::result::Result<PeakTable, MaterialError> {
    let mut table = PeakTable::new(&material.name);
    for sample in &material.samples {
        let tag = |err| {
            MaterialError::new(&material.name, err)
                .with_sample(format!("{} mm, {}", sample.thickness, sample.label))
        };
        let peak_count = extract_peak(&sample.spectrum, window).map_err(tag)?;
        log::debug!(
            "{}: {} mm -> peak {peak_count}",
            material.name,
            sample.thickness
        );
        table
            .insert(PeakRecord {
                thickness: sample.thickness,
                peak_count,
            })
            .map_err(tag)?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Peak listing: "<thickness>: <peak_count> \n" per record
// ---------------------------------------------------------------------------

/// Write the listing in the table's insertion order.
pub fn write_listing<W: Write>(table: &PeakTable, mut out: W) -> std::io::Result<()> {
    for record in table.records() {
        writeln!(out, "{}: {} ", record.thickness, record.peak_count)?;
    }
    out.flush()
}

/// Write the listing to `path`, replacing any previous file.
pub fn save_listing(table: &PeakTable, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| AttenuationError::io(path, e))?;
    write_listing(table, BufWriter::new(file)).map_err(|e| AttenuationError::io(path, e))
}

/// Parse a listing back into a table. Blank lines are skipped and the
/// trailing space after the count is optional.
pub fn parse_listing(material: &str, text: &str) -> Result<PeakTable> {
    let mut table = PeakTable::new(material);
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let format_error = || AttenuationError::Format {
            source_name: format!("peak listing for {material}"),
            line: idx + 1,
            content: line.to_string(),
        };
        let (thickness, count) = line.split_once(':').ok_or_else(format_error)?;
        let thickness: f64 = thickness.trim().parse().map_err(|_| format_error())?;
        let peak_count: u64 = count.trim().parse().map_err(|_| format_error())?;
        table.insert(PeakRecord {
            thickness,
            peak_count,
        })?;
    }
    Ok(table)
}

/// Read a listing file written by [`save_listing`].
pub fn load_listing(material: &str, path: &Path) -> Result<PeakTable> {
    let text = std::fs::read_to_string(path).map_err(|e| AttenuationError::io(path, e))?;
    parse_listing(material, &text)
}

use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            hsl_to_color32(Hsl::new(hue, 0.75, 0.55))
        })
        .collect()
}

/// Single-hue ramp from light to dark, used for increasing absorber
/// thickness within one material.
pub fn thickness_ramp(base: Color32, n: usize) -> Vec<Color32> {
    let rgb = Srgb::new(base.r(), base.g(), base.b()).into_format::<f32>();
    let hsl: Hsl = rgb.into_color();
    (0..n)
        .map(|i| {
            let t = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
            hsl_to_color32(Hsl::new(hsl.hue, hsl.saturation, 0.75 - 0.45 * t))
        })
        .collect()
}

fn hsl_to_color32(hsl: Hsl) -> Color32 {
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Color mapping: material name → Color32
// ---------------------------------------------------------------------------

/// Gives every material of a run its own colour.
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
}

impl ColorMap {
    pub fn new<'a>(materials: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<&str> = materials.into_iter().collect();
        let palette = generate_palette(names.len());
        let mapping = names
            .into_iter()
            .zip(palette)
            .map(|(name, c)| (name.to_string(), c))
            .collect();
        ColorMap { mapping }
    }

    /// Look up the colour for a material; unknown names are gray.
    pub fn color_for(&self, material: &str) -> Color32 {
        self.mapping
            .get(material)
            .copied()
            .unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_distinct_colours() {
        let colours = generate_palette(4);
        assert_eq!(colours.len(), 4);
        for (i, a) in colours.iter().enumerate() {
            for b in &colours[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn ramp_darkens_with_thickness() {
        let ramp = thickness_ramp(Color32::from_rgb(200, 40, 40), 5);
        let lightness = |c: &Color32| c.r() as u32 + c.g() as u32 + c.b() as u32;
        assert!(lightness(&ramp[0]) > lightness(&ramp[4]));
    }

    #[test]
    fn unknown_material_is_gray() {
        let map = ColorMap::new(["Pb", "Cu"]);
        assert_ne!(map.color_for("Pb"), map.color_for("Cu"));
        assert_eq!(map.color_for("Sn"), Color32::GRAY);
    }
}

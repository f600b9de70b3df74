use crate::error::SerialPressError;
use base64::Engine;
use log::warn;
use serde::{Deserialize, Serialize};

/// Physical (mm) placement box of the printed object inside a slot.
/// `w`/`h` are the authoritative print size; slot and background sizes
/// never override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectBox {
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub x_mm: Option<f64>,
    #[serde(default)]
    pub y_mm: Option<f64>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub rotation_deg: Option<f64>,
    #[serde(default)]
    pub cut_margin_mm: Option<f64>,
}

impl ObjectBox {
    pub fn cut_margin_mm(&self) -> f64 {
        // Negative margins are clamped, not rejected.
        self.cut_margin_mm.unwrap_or(0.0).max(0.0)
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub start: String,
    pub count: u32,
    pub anchor_space: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    pub font_size_mm: f64,
    #[serde(default)]
    pub per_letter_font_size_mm: Option<Vec<f64>>,
    pub x_mm: f64,
    pub y_mm: f64,
    #[serde(default)]
    pub letter_spacing_mm: f64,
    #[serde(default)]
    pub rotation_deg: f64,
    #[serde(default = "default_series_color")]
    pub color: String,
}

impl SeriesConfig {
    /// Size for the i-th glyph: the per-letter entry when present and
    /// positive, otherwise the series-wide size.
    pub fn letter_size_mm(&self, index: usize) -> f64 {
        self.per_letter_font_size_mm
            .as_deref()
            .and_then(|sizes| sizes.get(index).copied())
            .filter(|size| *size > 0.0)
            .unwrap_or(self.font_size_mm)
    }
}

fn default_font_family() -> String {
    "Helvetica".to_string()
}

fn default_series_color() -> String {
    "#000000".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFont {
    pub family: String,
    pub data_url: String,
    pub mime: String,
}

/// Overlays composite after the background and before the series text.
/// The SVG variant references a separate vector source by store key; the
/// image variant carries its payload inline as a data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Overlay {
    Svg(SvgOverlay),
    Image(ImageOverlay),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvgOverlay {
    #[serde(default = "default_svg_overlay_type", rename = "type")]
    pub kind: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub scale: f64,
    #[serde(default)]
    pub rotation_deg: f64,
    pub svg_key: String,
}

fn default_svg_overlay_type() -> String {
    "svg".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    pub data_url: String,
    pub mime: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub w_mm: f64,
    pub h_mm: f64,
    #[serde(default)]
    pub rotation_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    ExactMm,
    Legacy,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::ExactMm => "exact_mm",
            RenderMode::Legacy => "legacy",
        }
    }

    /// Collapse the externally-visible mode names onto the two geometry
    /// modes. The `deterministic_outlined*` variants additionally request
    /// outlined series text; the flag rides alongside the normalized mode
    /// and never enters the template descriptor.
    pub fn normalize(raw: Option<&str>) -> (RenderMode, bool) {
        let raw = raw.unwrap_or("").trim();
        match raw {
            "" | "exact_mm" | "preview" | "print_authoritative" => (RenderMode::ExactMm, false),
            "deterministic_outlined" | "deterministic_outlined_4up" => (RenderMode::ExactMm, true),
            _ => (RenderMode::Legacy, false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` / `#rrggbb` or a basic CSS color name. An unparseable
    /// color degrades to black (with a warning) rather than failing the
    /// render.
    pub fn parse(raw: &str) -> Color {
        let raw = raw.trim();
        if let Some(hex) = raw.strip_prefix('#') {
            let expanded: String = match hex.len() {
                3 => hex.chars().flat_map(|c| [c, c]).collect(),
                6 => hex.to_string(),
                _ => return Color::unparseable(raw),
            };
            return match u32::from_str_radix(&expanded, 16) {
                Ok(value) => Color::from_rgb24(value),
                Err(_) => Color::unparseable(raw),
            };
        }
        match named_color(raw) {
            Some(value) => Color::from_rgb24(value),
            None => Color::unparseable(raw),
        }
    }

    fn from_rgb24(value: u32) -> Color {
        Color {
            r: ((value >> 16) & 0xFF) as f32 / 255.0,
            g: ((value >> 8) & 0xFF) as f32 / 255.0,
            b: (value & 0xFF) as f32 / 255.0,
        }
    }

    fn unparseable(raw: &str) -> Color {
        warn!("unparseable series color '{raw}', using black");
        Color::BLACK
    }
}

/// The CSS basic color keywords plus the handful the editor offers.
fn named_color(name: &str) -> Option<u32> {
    let value = match name.to_ascii_lowercase().as_str() {
        "black" => 0x000000,
        "white" => 0xFFFFFF,
        "red" => 0xFF0000,
        "lime" => 0x00FF00,
        "green" => 0x008000,
        "blue" => 0x0000FF,
        "yellow" => 0xFFFF00,
        "cyan" | "aqua" => 0x00FFFF,
        "magenta" | "fuchsia" => 0xFF00FF,
        "silver" => 0xC0C0C0,
        "gray" | "grey" => 0x808080,
        "maroon" => 0x800000,
        "olive" => 0x808000,
        "purple" => 0x800080,
        "teal" => 0x008080,
        "navy" => 0x000080,
        "orange" => 0xFFA500,
        _ => return None,
    };
    Some(value)
}

/// Decode a `data:` URI into payload bytes and the declared mime type.
pub fn decode_data_url(data_url: &str) -> Result<(Vec<u8>, String), SerialPressError> {
    let raw = data_url.trim();
    let Some(rest) = raw.strip_prefix("data:") else {
        return Err(SerialPressError::InvalidInput(
            "data url must start with 'data:'".to_string(),
        ));
    };
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(SerialPressError::InvalidInput(
            "data url has no payload".to_string(),
        ));
    };
    if payload.is_empty() {
        return Err(SerialPressError::InvalidInput(
            "data url has no payload".to_string(),
        ));
    }
    let mime = header.split(';').next().unwrap_or("").to_string();
    if header.split(';').any(|part| part == "base64") {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.as_bytes())
            .map_err(|err| {
                SerialPressError::InvalidInput(format!("data url base64 payload: {err}"))
            })?;
        Ok((bytes, mime))
    } else {
        Ok((payload.as_bytes().to_vec(), mime))
    }
}

use crate::error::SerialPressError;
use crate::fontdir::{CORE_FONTS, FontCatalog, FontSource};
use crate::types::{CustomFont, decode_data_url};
use log::warn;
use std::collections::HashMap;
use std::fs;

/// Glyph metrics captured at registration, in 1000-unit text space, so PDF
/// serialization never re-parses the face.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub cap_height: i16,
    pub bbox: (i16, i16, i16, i16),
    /// Advance widths for character codes 32..=255, Latin-1 mapped.
    pub widths: Vec<u16>,
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Result<FontMetrics, SerialPressError> {
        let upem = face.units_per_em();
        if upem == 0 {
            return Err(SerialPressError::InvalidAsset(
                "font has zero units per em".to_string(),
            ));
        }
        let to_milli = |v: i16| -> i16 {
            ((v as f64) * 1000.0 / upem as f64).round() as i16
        };
        let bbox = face.global_bounding_box();
        let default_width = ((upem as f64 / 2.0) * 1000.0 / upem as f64).round() as u16;
        let widths = (32u32..=255)
            .map(|code| {
                char::from_u32(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| ((adv as f64) * 1000.0 / upem as f64).round() as u16)
                    .unwrap_or(default_width)
            })
            .collect();
        Ok(FontMetrics {
            units_per_em: upem,
            ascent: to_milli(face.ascender()),
            descent: to_milli(face.descender()),
            cap_height: to_milli(face.capital_height().unwrap_or_else(|| face.ascender())),
            bbox: (
                to_milli(bbox.x_min),
                to_milli(bbox.y_min),
                to_milli(bbox.x_max),
                to_milli(bbox.y_max),
            ),
            widths,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegisteredFont {
    pub family: String,
    pub data: Vec<u8>,
    pub metrics: FontMetrics,
}

/// Per-render table of fonts with embeddable bytes, keyed by normalized
/// family name. Core fonts are never stored here; they resolve by name.
#[derive(Default)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register font bytes under the given family. The first registration
    /// of a family wins; the bytes must parse as TrueType/OpenType.
    pub fn register_bytes(&mut self, family: &str, data: Vec<u8>) -> Result<(), SerialPressError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|_| {
            SerialPressError::InvalidAsset(format!("font '{family}' is not a parseable ttf/otf"))
        })?;
        let metrics = FontMetrics::from_face(&face)?;
        let key = normalize_name(family);
        if key.is_empty() {
            return Err(SerialPressError::InvalidAsset(
                "font family name is empty".to_string(),
            ));
        }
        if self.lookup.contains_key(&key) {
            return Ok(());
        }
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            family: family.trim().to_string(),
            data,
            metrics,
        });
        self.lookup.insert(key, index);
        Ok(())
    }

    pub fn get(&self, family: &str) -> Option<&RegisteredFont> {
        self.lookup
            .get(&normalize_name(family))
            .and_then(|index| self.fonts.get(*index))
    }

    pub fn contains(&self, family: &str) -> bool {
        self.lookup.contains_key(&normalize_name(family))
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

const WOFF_MAGIC: [u8; 4] = *b"wOFF";
const WOFF2_MAGIC: [u8; 4] = *b"wOF2";

/// Decode and register each request-supplied custom font. Unsupported
/// container formats (woff/woff2) and unparseable payloads fail the
/// request; these fonts are named assets, not best-effort hints.
pub fn register_custom_fonts(
    registry: &mut FontRegistry,
    fonts: &[CustomFont],
) -> Result<(), SerialPressError> {
    for font in fonts {
        let (bytes, _mime) = decode_data_url(&font.data_url).map_err(|err| {
            SerialPressError::InvalidAsset(format!("custom font '{}': {err}", font.family))
        })?;
        if bytes.len() >= 4 && (bytes[..4] == WOFF_MAGIC || bytes[..4] == WOFF2_MAGIC) {
            return Err(SerialPressError::InvalidAsset(format!(
                "custom font '{}': woff/woff2 containers are not supported, supply ttf or otf",
                font.family
            )));
        }
        registry.register_bytes(&font.family, bytes)?;
    }
    Ok(())
}

/// Outcome of font resolution. `embedded` means the registry holds bytes
/// for this family and text can be embedded or outlined.
#[derive(Debug, Clone, PartialEq)]
pub struct FontResolution {
    pub family: String,
    pub source: FontSource,
    pub embedded: bool,
}

fn core_font_name(family: &str) -> Option<&'static str> {
    let wanted = family.trim();
    CORE_FONTS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(wanted))
        .copied()
}

fn helvetica_fallback(requested: &str, source: FontSource) -> FontResolution {
    warn!(
        "font family fallback: requested='{}' resolved='Helvetica' source='{}'",
        requested,
        source.as_str()
    );
    FontResolution {
        family: "Helvetica".to_string(),
        source,
        embedded: false,
    }
}

/// Resolve a requested family against the registry and the system catalog.
/// Never fails: anything unusable degrades to core Helvetica.
pub fn resolve_font_family(
    requested: &str,
    registry: &mut FontRegistry,
    catalog: &FontCatalog,
) -> FontResolution {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return FontResolution {
            family: "Helvetica".to_string(),
            source: FontSource::PdfCore,
            embedded: false,
        };
    }
    if let Some(font) = registry.get(trimmed) {
        return FontResolution {
            family: font.family.clone(),
            source: FontSource::Registered,
            embedded: true,
        };
    }
    if let Some(core) = core_font_name(trimmed) {
        return FontResolution {
            family: core.to_string(),
            source: FontSource::PdfCore,
            embedded: false,
        };
    }
    let Some(entry) = catalog.lookup(trimmed) else {
        return helvetica_fallback(trimmed, FontSource::PdfCore);
    };
    if !entry.embeddable {
        return helvetica_fallback(trimmed, entry.source);
    }
    let Some(path) = entry.path.as_ref() else {
        return helvetica_fallback(trimmed, entry.source);
    };
    let Ok(bytes) = fs::read(path) else {
        return helvetica_fallback(trimmed, entry.source);
    };
    if registry.register_bytes(&entry.family, bytes).is_err() {
        return helvetica_fallback(trimmed, entry.source);
    }
    FontResolution {
        family: entry.family.clone(),
        source: entry.source,
        embedded: true,
    }
}

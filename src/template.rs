use crate::error::SerialPressError;
use crate::hash::{canonical_json, sha256_hex};
use crate::types::{CustomFont, ObjectBox, Overlay, RenderMode, SeriesConfig};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything that determines the rendered geometry of one sheet family.
/// Immutable once created; identified by the hash of its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub template_id: String,
    pub background_pdf_path: PathBuf,
    pub object_box: ObjectBox,
    pub series: SeriesConfig,
    pub custom_fonts: Vec<CustomFont>,
    pub overlays: Vec<Overlay>,
    pub render_mode: RenderMode,
}

#[derive(Serialize)]
struct Descriptor<'a> {
    svg_hash: &'a str,
    object_mm: &'a ObjectBox,
    series: &'a SeriesConfig,
    custom_fonts: &'a [CustomFont],
    overlays: &'a [Overlay],
    render_mode: &'a str,
}

/// SHA-256 of the canonical (recursively key-sorted, whitespace-free) JSON
/// descriptor. Stable across process restarts and input key ordering.
pub fn compute_template_id(
    svg_hash: &str,
    object_box: &ObjectBox,
    series: &SeriesConfig,
    custom_fonts: &[CustomFont],
    overlays: &[Overlay],
    render_mode: RenderMode,
) -> Result<String, SerialPressError> {
    let descriptor = Descriptor {
        svg_hash,
        object_mm: object_box,
        series,
        custom_fonts,
        overlays,
        render_mode: render_mode.as_str(),
    };
    let payload = canonical_json(&descriptor)
        .map_err(|err| SerialPressError::InvalidInput(format!("template descriptor: {err}")))?;
    Ok(sha256_hex(payload.as_bytes()))
}

/// Return the cached template record for this id, or create and persist
/// it. Records are content-addressed and immutable, so check-then-create
/// is race-safe: two writers produce byte-identical payloads. A malformed
/// record on disk is rewritten rather than failing the render.
pub fn load_or_create_template(
    cache_dir: &Path,
    template_id: &str,
    background_pdf_path: &Path,
    object_box: &ObjectBox,
    series: &SeriesConfig,
    custom_fonts: &[CustomFont],
    overlays: &[Overlay],
    render_mode: RenderMode,
) -> Result<Template, SerialPressError> {
    fs::create_dir_all(cache_dir)?;
    let record_path = cache_dir.join(format!("{template_id}.json"));
    if let Ok(bytes) = fs::read(&record_path) {
        if let Ok(template) = serde_json::from_slice::<Template>(&bytes) {
            debug!("template cache hit: {template_id}");
            return Ok(template);
        }
    }

    let template = Template {
        template_id: template_id.to_string(),
        background_pdf_path: background_pdf_path.to_path_buf(),
        object_box: object_box.clone(),
        series: series.clone(),
        custom_fonts: custom_fonts.to_vec(),
        overlays: overlays.to_vec(),
        render_mode,
    };
    let payload = canonical_json(&template)
        .map_err(|err| SerialPressError::InvalidInput(format!("template record: {err}")))?;
    fs::write(&record_path, payload)?;
    Ok(template)
}

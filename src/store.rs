use crate::error::SerialPressError;
use crate::hash::sha256_hex;
use crate::units::mm_to_pt;
use log::debug;
use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Opaque key→bytes store. The engine treats all store calls as fallible
/// synchronous operations with no partial-result semantics.
pub trait ObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, SerialPressError>;
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), SerialPressError>;
}

/// Filesystem-backed store rooted at a directory; keys map to relative paths.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, SerialPressError> {
        let relative = Path::new(key);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(SerialPressError::Store(format!(
                "key escapes store root: {key}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, SerialPressError> {
        let path = self.resolve(key)?;
        fs::read(&path).map_err(|err| SerialPressError::Store(format!("get {key}: {err}")))
    }

    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), SerialPressError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| SerialPressError::Store(format!("put {key}: {err}")))?;
        }
        fs::write(&path, bytes).map_err(|err| SerialPressError::Store(format!("put {key}: {err}")))
    }
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, SerialPressError> {
        let map = self
            .objects
            .lock()
            .map_err(|_| SerialPressError::Store("store lock poisoned".to_string()))?;
        map.get(key)
            .cloned()
            .ok_or_else(|| SerialPressError::Store(format!("no such key: {key}")))
    }

    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), SerialPressError> {
        let mut map = self
            .objects
            .lock()
            .map_err(|_| SerialPressError::Store("store lock poisoned".to_string()))?;
        map.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Opaque SVG→vector-PDF conversion: deterministic given identical input
/// bytes, yielding a single-page PDF whose MediaBox is the SVG's own size.
/// The SVG is never normalized to a page format; physical sizing happens at
/// placement time only.
pub trait SvgConverter {
    fn convert(&self, svg: &[u8]) -> Result<Vec<u8>, SerialPressError>;
}

/// Fallback converter: reads the SVG's intrinsic size and emits an empty
/// vector page of exactly that size. Placement, scaling, and caching behave
/// as with a real converter; only the drawn content is missing.
pub struct SizedBlankConverter;

impl SvgConverter for SizedBlankConverter {
    fn convert(&self, svg: &[u8]) -> Result<Vec<u8>, SerialPressError> {
        let text = std::str::from_utf8(svg).map_err(|_| {
            SerialPressError::InvalidAsset("background svg is not valid utf-8".to_string())
        })?;
        let doc = roxmltree::Document::parse(text).map_err(|err| {
            SerialPressError::InvalidAsset(format!("background svg parse: {err}"))
        })?;
        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return Err(SerialPressError::InvalidAsset(
                "background svg has no <svg> root".to_string(),
            ));
        }
        let (w_pt, h_pt) = svg_intrinsic_size_pt(&root).ok_or_else(|| {
            SerialPressError::InvalidAsset(
                "background svg has no usable width/height or viewBox".to_string(),
            )
        })?;
        if w_pt <= 0.0 || h_pt <= 0.0 {
            return Err(SerialPressError::InvalidAsset(
                "background svg size must be > 0".to_string(),
            ));
        }
        Ok(blank_page_pdf(w_pt, h_pt))
    }
}

fn svg_intrinsic_size_pt(root: &roxmltree::Node<'_, '_>) -> Option<(f64, f64)> {
    let explicit = match (root.attribute("width"), root.attribute("height")) {
        (Some(w), Some(h)) => Some((parse_svg_length_pt(w)?, parse_svg_length_pt(h)?)),
        _ => None,
    };
    if explicit.is_some() {
        return explicit;
    }
    let view_box = root.attribute("viewBox")?;
    let parts: Vec<f64> = view_box
        .split([' ', ','])
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if parts.len() != 4 {
        return None;
    }
    // viewBox units are user units, 96 dpi.
    Some((parts[2] * 0.75, parts[3] * 0.75))
}

fn parse_svg_length_pt(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(raw.len());
    let value: f64 = raw[..split].trim().parse().ok()?;
    match raw[split..].trim() {
        "mm" => Some(mm_to_pt(value)),
        "cm" => Some(mm_to_pt(value * 10.0)),
        "in" => Some(value * 72.0),
        "pt" => Some(value),
        "pc" => Some(value * 12.0),
        // User units at 96 dpi.
        "" | "px" => Some(value * 0.75),
        _ => None,
    }
}

pub(crate) fn blank_page_pdf(w_pt: f64, h_pt: f64) -> Vec<u8> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(LoStream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {},
        "MediaBox" => vec![
            0.into(),
            0.into(),
            LoObject::Real(w_pt as f32),
            LoObject::Real(h_pt as f32),
        ],
    });
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = doc.save_to(&mut out);
    out
}

/// Cache-format tag: bumping it invalidates previously converted
/// backgrounds without manual cleanup.
pub const BACKGROUND_FORMAT_VERSION: &str = "v1";

const PDF_SIGNATURE: &[u8] = b"%PDF-";

pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}

/// Convert an SVG (by store key or local path) to a vector PDF, cached by
/// content hash. Identical SVG bytes convert at most once per format
/// version; the cached file is revalidated against the PDF signature and
/// reconverted if corrupt.
pub fn convert_svg_cached(
    store: &dyn ObjectStore,
    converter: &dyn SvgConverter,
    cache_dir: &Path,
    svg_key: &str,
) -> Result<(String, PathBuf), SerialPressError> {
    let svg_bytes = read_svg_bytes(store, svg_key)?;
    let svg_hash = sha256_hex(&svg_bytes);

    fs::create_dir_all(cache_dir)?;
    let cached = cache_dir.join(format!("{svg_hash}_{BACKGROUND_FORMAT_VERSION}.pdf"));
    if cached.is_file() {
        match fs::read(&cached) {
            Ok(bytes) if has_pdf_signature(&bytes) => {
                debug!("background cache hit: {}", cached.display());
                return Ok((svg_hash, cached));
            }
            _ => {
                // Corrupt or unreadable cache entry: drop and reconvert.
                let _ = fs::remove_file(&cached);
            }
        }
    }

    let pdf_bytes = converter.convert(&svg_bytes)?;
    if !has_pdf_signature(&pdf_bytes) {
        return Err(SerialPressError::InvalidAsset(
            "background conversion did not produce a PDF".to_string(),
        ));
    }
    fs::write(&cached, &pdf_bytes)?;
    Ok((svg_hash, cached))
}

fn read_svg_bytes(store: &dyn ObjectStore, svg_key: &str) -> Result<Vec<u8>, SerialPressError> {
    let local = Path::new(svg_key);
    if local.is_file() {
        return Ok(fs::read(local)?);
    }
    store.get(svg_key)
}

mod canvas;
mod error;
mod font;
mod fontdir;
mod hash;
mod layout;
mod metrics;
mod outline;
mod pdfwrite;
mod render;
mod series;
mod store;
mod template;
#[cfg(test)]
mod testfont;
mod types;
mod units;

pub use canvas::{Canvas, Command, Document, Page, TextRun};
pub use error::SerialPressError;
pub use font::{FontRegistry, FontResolution, register_custom_fonts, resolve_font_family};
pub use fontdir::{CORE_FONTS, CatalogEntry, FontCatalog, FontSource};
pub use hash::{canonical_json, sha256_hex};
pub use layout::{
    A4_HEIGHT_MM, A4_WIDTH_MM, ComposeContext, OBJECTS_PER_PAGE, SlotGeometry, compose,
};
pub use metrics::{EngineMetrics, PointPt, ScaleFactors, SizePt};
pub use outline::{OutlineBounds, OutlineRun, PathOp, outline_text, outline_text_sized};
pub use pdfwrite::{pdf_page_size_pt, write_document};
pub use render::{RenderOutcome, RenderRequest, Renderer};
pub use series::SeriesSpec;
pub use store::{
    BACKGROUND_FORMAT_VERSION, FsStore, MemoryStore, ObjectStore, SizedBlankConverter,
    SvgConverter, convert_svg_cached,
};
pub use template::{Template, compute_template_id, load_or_create_template};
pub use types::{
    Alignment, Color, CustomFont, ImageOverlay, ObjectBox, Overlay, RenderMode, SeriesConfig,
    SvgOverlay, decode_data_url,
};
pub use units::{POINTS_PER_MM, mm_to_pt, pt_to_mm};

use crate::canvas::Canvas;
use crate::error::SerialPressError;
use crate::font::{FontRegistry, register_custom_fonts};
use crate::fontdir::FontCatalog;
use crate::layout::{A4_HEIGHT_MM, A4_WIDTH_MM, ComposeContext, compose};
use crate::metrics::EngineMetrics;
use crate::pdfwrite::write_document;
use crate::store::{ObjectStore, SvgConverter, convert_svg_cached};
use crate::template::{compute_template_id, load_or_create_template};
use crate::types::{CustomFont, ObjectBox, Overlay, RenderMode, SeriesConfig};
use crate::units::mm_to_pt;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    pub job_id: String,
    pub svg_key: String,
    pub object_box: ObjectBox,
    pub series: SeriesConfig,
    #[serde(default)]
    pub custom_fonts: Vec<CustomFont>,
    #[serde(default)]
    pub overlays: Vec<Overlay>,
    #[serde(default)]
    pub render_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub status: String,
    pub output_key: String,
    pub pages: u32,
    pub template_id: String,
    pub metrics: EngineMetrics,
}

/// One-shot synchronous renderer. All collaborators are injected; the
/// system font catalog defaults to the process-wide scan.
pub struct Renderer<'a> {
    store: &'a dyn ObjectStore,
    converter: &'a dyn SvgConverter,
    catalog: &'a FontCatalog,
    cache_dir: PathBuf,
}

impl<'a> Renderer<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        converter: &'a dyn SvgConverter,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            converter,
            catalog: FontCatalog::global(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn with_catalog(mut self, catalog: &'a FontCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Render the full document for a request. On any error nothing is
    /// written to the store.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderOutcome, SerialPressError> {
        let (mode, outlined) = RenderMode::normalize(request.render_mode.as_deref());

        let (svg_hash, background_pdf_path) = convert_svg_cached(
            self.store,
            self.converter,
            &self.cache_dir,
            &request.svg_key,
        )?;

        let template_id = compute_template_id(
            &svg_hash,
            &request.object_box,
            &request.series,
            &request.custom_fonts,
            &request.overlays,
            mode,
        )?;
        let template = load_or_create_template(
            &self.cache_dir,
            &template_id,
            &background_pdf_path,
            &request.object_box,
            &request.series,
            &request.custom_fonts,
            &request.overlays,
            mode,
        )?;

        let mut registry = FontRegistry::new();
        register_custom_fonts(&mut registry, &template.custom_fonts)?;

        let background_pdf = fs::read(&template.background_pdf_path)?;

        let mut canvas = Canvas::new(mm_to_pt(A4_WIDTH_MM), mm_to_pt(A4_HEIGHT_MM));
        let ctx = ComposeContext {
            store: self.store,
            converter: self.converter,
            cache_dir: &self.cache_dir,
        };
        let (pages, metrics) = compose(
            &mut canvas,
            &template,
            &background_pdf,
            outlined,
            &mut registry,
            self.catalog,
            &ctx,
        )?;

        let pdf_bytes = write_document(&canvas.finish(), &registry)?;
        let output_key = format!("documents/final/{}.pdf", request.job_id);
        self.store
            .put(&output_key, &pdf_bytes, "application/pdf")?;
        info!(
            "render done: job_id='{}' template_id='{}' pages={} bytes={}",
            request.job_id,
            template_id,
            pages,
            pdf_bytes.len()
        );

        Ok(RenderOutcome {
            status: "DONE".to_string(),
            output_key,
            pages,
            template_id,
            metrics,
        })
    }
}

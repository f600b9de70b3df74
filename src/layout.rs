use crate::canvas::{Canvas, TextRun};
use crate::error::SerialPressError;
use crate::font::{FontRegistry, resolve_font_family};
use crate::fontdir::FontCatalog;
use crate::hash::sha256_hex;
use crate::metrics::{EngineMetrics, PointPt, ScaleFactors, SizePt};
use crate::outline::{PathOp, outline_text_sized};
use crate::pdfwrite::pdf_page_size_pt;
use crate::series::SeriesSpec;
use crate::store::{ObjectStore, SvgConverter, convert_svg_cached};
use crate::template::Template;
use crate::types::{Color, ImageOverlay, Overlay, RenderMode, SvgOverlay, decode_data_url};
use crate::units::mm_to_pt;
use log::info;
use std::fs;
use std::path::Path;

pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;
pub const OBJECTS_PER_PAGE: u32 = 4;

/// Vertical slot banding for one A4 page. Exact-mm inserts cut margins
/// between the four bands; legacy divides the page into equal quarters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotGeometry {
    Legacy,
    ExactMm { cut_margin_pt: f64 },
}

impl SlotGeometry {
    pub fn for_mode(mode: RenderMode, cut_margin_mm: f64) -> SlotGeometry {
        match mode {
            RenderMode::ExactMm => SlotGeometry::ExactMm {
                cut_margin_pt: mm_to_pt(cut_margin_mm),
            },
            RenderMode::Legacy => SlotGeometry::Legacy,
        }
    }

    pub fn slot_h_pt(&self, page_h_pt: f64) -> f64 {
        match self {
            SlotGeometry::Legacy => page_h_pt / OBJECTS_PER_PAGE as f64,
            SlotGeometry::ExactMm { cut_margin_pt } => {
                (page_h_pt - (OBJECTS_PER_PAGE - 1) as f64 * cut_margin_pt)
                    / OBJECTS_PER_PAGE as f64
            }
        }
    }

    /// Distance from the page top edge to the slot's top edge.
    pub fn slot_y_top_pt(&self, slot_index: u32, page_h_pt: f64) -> f64 {
        let slot_h = self.slot_h_pt(page_h_pt);
        match self {
            SlotGeometry::Legacy => slot_index as f64 * slot_h,
            SlotGeometry::ExactMm { cut_margin_pt } => {
                slot_index as f64 * (slot_h + cut_margin_pt)
            }
        }
    }
}

pub struct ComposeContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub converter: &'a dyn SvgConverter,
    pub cache_dir: &'a Path,
}

/// Compose all pages for the template's series onto the canvas. Returns
/// the page count and the geometry actually used for the first object.
pub fn compose(
    canvas: &mut Canvas,
    template: &Template,
    background_pdf: &[u8],
    outlined: bool,
    registry: &mut FontRegistry,
    catalog: &FontCatalog,
    ctx: &ComposeContext<'_>,
) -> Result<(u32, EngineMetrics), SerialPressError> {
    let series = &template.series;
    if series.count == 0 {
        return Err(SerialPressError::InvalidInput(
            "series.count must be > 0".to_string(),
        ));
    }
    if series.font_size_mm <= 0.0 {
        return Err(SerialPressError::InvalidInput(
            "series.font_size_mm must be > 0".to_string(),
        ));
    }
    if series.anchor_space.trim().to_lowercase() != "object_mm" {
        return Err(SerialPressError::InvalidInput(
            "series placement requires anchor_space=object_mm".to_string(),
        ));
    }
    let spec = SeriesSpec::parse(&series.start)?;

    let object_box = &template.object_box;
    let object_w_pt = mm_to_pt(object_box.w);
    let object_h_pt = mm_to_pt(object_box.h);
    if object_w_pt <= 0.0 || object_h_pt <= 0.0 {
        return Err(SerialPressError::InvalidInput(
            "object w and h must be > 0".to_string(),
        ));
    }

    let resolution = resolve_font_family(&series.font_family, registry, catalog);
    info!(
        "series font: requested='{}' resolved='{}' source='{}' embedded={}",
        series.font_family,
        resolution.family,
        resolution.source.as_str(),
        resolution.embedded
    );
    // The outlined variant needs raw font bytes; core fonts have none and
    // keep the text-object path.
    let outline_font: Option<Vec<u8>> = if outlined {
        registry.get(&resolution.family).map(|f| f.data.clone())
    } else {
        None
    };

    let (svg_w_pt, svg_h_pt) = pdf_page_size_pt(background_pdf)?;
    let scale_x = object_w_pt / svg_w_pt;
    let scale_y = object_h_pt / svg_h_pt;

    let background_id = format!("bg_{}", template.template_id);
    canvas.register_form(background_id.clone(), background_pdf.to_vec());

    let page_w_pt = mm_to_pt(A4_WIDTH_MM);
    let page_h_pt = mm_to_pt(A4_HEIGHT_MM);
    let slot_w_pt = page_w_pt;

    let geometry = SlotGeometry::for_mode(template.render_mode, object_box.cut_margin_mm());
    let slot_h_pt = geometry.slot_h_pt(page_h_pt);

    let count = series.count;
    let total_pages = count.div_ceil(OBJECTS_PER_PAGE);
    let fill_color = Color::parse(&series.color);
    let letter_spacing_pt = mm_to_pt(series.letter_spacing_mm);

    let mut serial_index: u32 = 0;
    let mut metrics: Option<EngineMetrics> = None;

    for _page in 0..total_pages {
        for slot_index in 0..OBJECTS_PER_PAGE {
            if serial_index >= count {
                continue;
            }

            let slot_y_top_pt = geometry.slot_y_top_pt(slot_index, page_h_pt);
            let slot_y_pt = page_h_pt - slot_y_top_pt - slot_h_pt;
            let slot_x_pt = 0.0;

            if template.render_mode == RenderMode::Legacy
                && (object_w_pt > slot_w_pt || object_h_pt > slot_h_pt)
            {
                return Err(SerialPressError::InvalidInput(
                    "object size exceeds slot size".to_string(),
                ));
            }

            let (object_x_pt, object_y_pt) = match template.render_mode {
                RenderMode::ExactMm => {
                    let alignment = object_box.alignment();
                    let x_offset_pt = object_box.x_mm.map(mm_to_pt).unwrap_or(0.0);
                    // x_mm == 0 is absolute from the page left edge and
                    // bypasses alignment, except right pins to the page's
                    // right edge. Kept bit-for-bit with prior output.
                    let object_x_pt = if object_box.x_mm == Some(0.0) {
                        match alignment {
                            crate::types::Alignment::Right => page_w_pt - object_w_pt,
                            _ => 0.0,
                        }
                    } else {
                        let base_x = match alignment {
                            crate::types::Alignment::Left => slot_x_pt,
                            crate::types::Alignment::Right => {
                                slot_x_pt + slot_w_pt - object_w_pt
                            }
                            crate::types::Alignment::Center => {
                                slot_x_pt + (slot_w_pt - object_w_pt) / 2.0
                            }
                        };
                        base_x + x_offset_pt
                    };
                    let y_offset_pt = object_box.y_mm.map(mm_to_pt).unwrap_or(0.0);
                    let object_y_pt = (page_h_pt - slot_y_top_pt) - object_h_pt - y_offset_pt;
                    (object_x_pt, object_y_pt)
                }
                RenderMode::Legacy => (
                    slot_x_pt + (slot_w_pt - object_w_pt) / 2.0,
                    slot_y_pt + (slot_h_pt - object_h_pt) / 2.0,
                ),
            };

            // Background, clipped to the slot (exact-mm) or the object.
            canvas.save_state();
            match template.render_mode {
                RenderMode::ExactMm => {
                    canvas.clip_rect(slot_x_pt, slot_y_pt, slot_w_pt, slot_h_pt);
                    canvas.translate(
                        object_x_pt + object_w_pt / 2.0,
                        object_y_pt + object_h_pt / 2.0,
                    );
                    let rotation = object_box.rotation_deg.unwrap_or(0.0);
                    if rotation != 0.0 {
                        canvas.rotate_deg(rotation);
                    }
                    canvas.scale(scale_x, scale_y);
                    canvas.translate(-svg_w_pt / 2.0, -svg_h_pt / 2.0);
                }
                RenderMode::Legacy => {
                    canvas.clip_rect(object_x_pt, object_y_pt, object_w_pt, object_h_pt);
                    canvas.translate(object_x_pt, object_y_pt);
                    canvas.scale(scale_x, scale_y);
                }
            }
            canvas.draw_form(background_id.clone());
            canvas.restore_state();

            for overlay in &template.overlays {
                draw_overlay(canvas, overlay, object_x_pt, object_y_pt, object_h_pt, ctx)?;
            }

            let serial = spec.value(serial_index);
            serial_index += 1;

            let anchor_x_pt = object_x_pt + mm_to_pt(series.x_mm);
            let anchor_y_pt = object_y_pt + (object_h_pt - mm_to_pt(series.y_mm));

            canvas.save_state();
            canvas.translate(anchor_x_pt, anchor_y_pt);
            if series.rotation_deg != 0.0 {
                canvas.rotate_deg(series.rotation_deg);
            }
            canvas.set_fill_color(fill_color);

            if let Some(font_bytes) = outline_font.as_deref() {
                let chars: Vec<(char, f64)> = serial
                    .chars()
                    .enumerate()
                    .map(|(i, ch)| (ch, mm_to_pt(series.letter_size_mm(i))))
                    .collect();
                let run = outline_text_sized(font_bytes, &chars, letter_spacing_pt, 0.0, 0.0)?;
                for op in &run.ops {
                    match *op {
                        PathOp::MoveTo(x, y) => canvas.move_to(x, y),
                        PathOp::LineTo(x, y) => canvas.line_to(x, y),
                        PathOp::CurveTo(x1, y1, x2, y2, x, y) => {
                            canvas.curve_to(x1, y1, x2, y2, x, y)
                        }
                        PathOp::Close => canvas.close_path(),
                    }
                }
                if !run.ops.is_empty() {
                    canvas.fill();
                }
            } else {
                let runs: Vec<TextRun> = serial
                    .chars()
                    .enumerate()
                    .map(|(i, ch)| TextRun {
                        font: resolution.family.clone(),
                        size_pt: mm_to_pt(series.letter_size_mm(i)),
                        text: ch.to_string(),
                    })
                    .collect();
                canvas.show_text(runs, letter_spacing_pt);
            }
            canvas.restore_state();

            if serial_index == 1 {
                metrics = Some(EngineMetrics {
                    svg_media_box_pt: SizePt {
                        w: svg_w_pt,
                        h: svg_h_pt,
                    },
                    object_mm: object_box.clone(),
                    object_pt: SizePt {
                        w: object_w_pt,
                        h: object_h_pt,
                    },
                    object_origin_pt: PointPt {
                        x: object_x_pt,
                        y: object_y_pt,
                    },
                    scale: ScaleFactors {
                        x: scale_x,
                        y: scale_y,
                    },
                    series_anchor_space: series.anchor_space.clone(),
                    series_svg_pt: PointPt {
                        x: mm_to_pt(series.x_mm),
                        y: svg_h_pt - mm_to_pt(series.y_mm),
                    },
                    series_pdf_pt: PointPt {
                        x: anchor_x_pt,
                        y: anchor_y_pt,
                    },
                });
            }
        }
        canvas.show_page();
    }

    // count > 0 guarantees at least one placement.
    let metrics = metrics.ok_or_else(|| {
        SerialPressError::InvalidInput("series produced no placements".to_string())
    })?;
    Ok((total_pages, metrics))
}

fn draw_overlay(
    canvas: &mut Canvas,
    overlay: &Overlay,
    object_x_pt: f64,
    object_y_pt: f64,
    object_h_pt: f64,
    ctx: &ComposeContext<'_>,
) -> Result<(), SerialPressError> {
    match overlay {
        Overlay::Svg(svg) => draw_svg_overlay(canvas, svg, object_x_pt, object_y_pt, object_h_pt, ctx),
        Overlay::Image(image) => {
            draw_image_overlay(canvas, image, object_x_pt, object_y_pt, object_h_pt, ctx)
        }
    }
}

/// SVG overlays anchor their untransformed intrinsic box top-left at
/// `(x_mm, y_mm)` in object space, then rotate and uniformly scale about
/// the box center. This mirrors the editor's CSS transform model.
fn draw_svg_overlay(
    canvas: &mut Canvas,
    overlay: &SvgOverlay,
    object_x_pt: f64,
    object_y_pt: f64,
    object_h_pt: f64,
    ctx: &ComposeContext<'_>,
) -> Result<(), SerialPressError> {
    if overlay.scale <= 0.0 {
        return Ok(());
    }
    let (hash, pdf_path) =
        convert_svg_cached(ctx.store, ctx.converter, ctx.cache_dir, &overlay.svg_key)?;
    let pdf_bytes = fs::read(&pdf_path)?;
    let (ov_w_pt, ov_h_pt) = pdf_page_size_pt(&pdf_bytes).map_err(|_| {
        SerialPressError::InvalidAsset(format!("overlay svg '{}' is invalid", overlay.svg_key))
    })?;

    let resource_id = format!("ov_{hash}");
    canvas.register_form(resource_id.clone(), pdf_bytes);

    let x_pt = object_x_pt + mm_to_pt(overlay.x_mm);
    let y_top_pt = object_y_pt + (object_h_pt - mm_to_pt(overlay.y_mm));
    let y_bottom_pt = y_top_pt - ov_h_pt;
    let cx = ov_w_pt / 2.0;
    let cy = ov_h_pt / 2.0;

    canvas.save_state();
    canvas.translate(x_pt, y_bottom_pt);
    canvas.translate(cx, cy);
    if overlay.rotation_deg != 0.0 {
        canvas.rotate_deg(overlay.rotation_deg);
    }
    canvas.scale(overlay.scale, overlay.scale);
    canvas.translate(-cx, -cy);
    canvas.draw_form(resource_id);
    canvas.restore_state();
    Ok(())
}

/// Image overlays are absolute in object-mm space (top-left origin) and
/// never inherit the background scale. Rotation is about the top-left
/// corner, matching the preview's transform origin.
fn draw_image_overlay(
    canvas: &mut Canvas,
    overlay: &ImageOverlay,
    object_x_pt: f64,
    object_y_pt: f64,
    object_h_pt: f64,
    ctx: &ComposeContext<'_>,
) -> Result<(), SerialPressError> {
    let (bytes, mime_from_url) = decode_data_url(&overlay.data_url)
        .map_err(|err| SerialPressError::InvalidInput(format!("overlay: {err}")))?;
    let mime = if overlay.mime.trim().is_empty() {
        mime_from_url
    } else {
        overlay.mime.trim().to_lowercase()
    };

    let w_pt = mm_to_pt(overlay.w_mm);
    let h_pt = mm_to_pt(overlay.h_mm);
    let x_pt = object_x_pt + mm_to_pt(overlay.x_mm);
    let y_bottom_pt = object_y_pt + (object_h_pt - mm_to_pt(overlay.y_mm) - h_pt);

    canvas.save_state();
    canvas.translate(x_pt, y_bottom_pt + h_pt);
    if overlay.rotation_deg != 0.0 {
        canvas.rotate_deg(overlay.rotation_deg);
    }
    canvas.translate(0.0, -h_pt);

    if mime.contains("svg") {
        let pdf_bytes = ctx.converter.convert(&bytes)?;
        let (ov_w_pt, ov_h_pt) = pdf_page_size_pt(&pdf_bytes).map_err(|_| {
            SerialPressError::InvalidAsset("overlay svg payload is invalid".to_string())
        })?;
        let resource_id = format!("ov_{}", sha256_hex(&bytes));
        canvas.register_form(resource_id.clone(), pdf_bytes);
        canvas.scale(w_pt / ov_w_pt, h_pt / ov_h_pt);
        canvas.draw_form(resource_id);
    } else {
        let resource_id = format!("img_{}", sha256_hex(&bytes));
        canvas.register_image(resource_id.clone(), bytes, mime);
        canvas.draw_image(0.0, 0.0, w_pt, h_pt, resource_id);
    }
    canvas.restore_state();
    Ok(())
}

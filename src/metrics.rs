use crate::types::ObjectBox;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizePt {
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointPt {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

/// Geometry actually used for the first placed object, reported back to
/// the caller for preview parity checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub svg_media_box_pt: SizePt,
    pub object_mm: ObjectBox,
    pub object_pt: SizePt,
    pub object_origin_pt: PointPt,
    pub scale: ScaleFactors,
    pub series_anchor_space: String,
    /// Series anchor expressed in the background's own pt space.
    pub series_svg_pt: PointPt,
    /// Series anchor on the output page, bottom-left origin.
    pub series_pdf_pt: PointPt,
}

use crate::error::SerialPressError;
use ttf_parser::GlyphId;

/// The only path primitives the pipeline emits. Quadratic segments never
/// appear; every font quadratic is elevated to an exact cubic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutlineBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub w: f64,
    pub h: f64,
}

/// Outlined text: filled path geometry plus the per-glyph advances that
/// produced the cursor positions.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineRun {
    pub ops: Vec<PathOp>,
    pub bbox: OutlineBounds,
    pub advances_pt: Vec<f64>,
}

struct GlyphSink {
    ops: Vec<PathOp>,
    scale: f64,
    dx: f64,
    last: (f64, f64),
}

impl GlyphSink {
    fn point(&self, x: f32, y: f32) -> (f64, f64) {
        (x as f64 * self.scale + self.dx, y as f64 * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for GlyphSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.last = p;
        self.ops.push(PathOp::MoveTo(p.0, p.1));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.last = p;
        self.ops.push(PathOp::LineTo(p.0, p.1));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        // Exact degree elevation: the cubic traces the identical curve.
        let q = self.point(x1, y1);
        let p = self.point(x, y);
        let p0 = self.last;
        let c1 = (p0.0 + 2.0 / 3.0 * (q.0 - p0.0), p0.1 + 2.0 / 3.0 * (q.1 - p0.1));
        let c2 = (p.0 + 2.0 / 3.0 * (q.0 - p.0), p.1 + 2.0 / 3.0 * (q.1 - p.1));
        self.last = p;
        self.ops.push(PathOp::CurveTo(c1.0, c1.1, c2.0, c2.1, p.0, p.1));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.point(x1, y1);
        let c2 = self.point(x2, y2);
        let p = self.point(x, y);
        self.last = p;
        self.ops.push(PathOp::CurveTo(c1.0, c1.1, c2.0, c2.1, p.0, p.1));
    }

    fn close(&mut self) {
        self.ops.push(PathOp::Close);
    }
}

/// Uniform-size text outlining. The anchor `(x_pt, y_pt)` receives the
/// normalized bbox corner; `y_pt` carries baseline semantics, no
/// top-alignment correction is applied.
pub fn outline_text(
    font_bytes: &[u8],
    text: &str,
    font_size_pt: f64,
    x_pt: f64,
    y_pt: f64,
) -> Result<OutlineRun, SerialPressError> {
    let chars: Vec<(char, f64)> = text.chars().map(|ch| (ch, font_size_pt)).collect();
    outline_text_sized(font_bytes, &chars, 0.0, x_pt, y_pt)
}

/// Per-glyph-size variant used by the series drawing path. After each
/// glyph the cursor advances by the font's own advance plus
/// `letter_spacing_pt`.
pub fn outline_text_sized(
    font_bytes: &[u8],
    chars: &[(char, f64)],
    letter_spacing_pt: f64,
    x_pt: f64,
    y_pt: f64,
) -> Result<OutlineRun, SerialPressError> {
    let face = ttf_parser::Face::parse(font_bytes, 0)
        .map_err(|_| SerialPressError::InvalidAsset("outline font is not parseable".to_string()))?;
    let upem = face.units_per_em();
    if upem == 0 {
        return Err(SerialPressError::InvalidAsset(
            "outline font has zero units per em".to_string(),
        ));
    }

    let mut ops = Vec::new();
    let mut advances = Vec::with_capacity(chars.len());
    let mut cursor = 0.0f64;
    let mut prev_gid: Option<GlyphId> = None;

    for &(ch, size_pt) in chars {
        let scale = size_pt / upem as f64;
        let gid = face.glyph_index(ch).unwrap_or(GlyphId(0));

        if let Some(prev) = prev_gid {
            cursor += kerning_units(&face, prev, gid) * scale;
        }

        let mut sink = GlyphSink {
            ops: Vec::new(),
            scale,
            dx: cursor,
            last: (cursor, 0.0),
        };
        // Empty outlines (spaces, .notdef) still advance the cursor.
        let _ = face.outline_glyph(gid, &mut sink);
        ops.extend(sink.ops);

        let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f64 * scale;
        advances.push(advance);
        cursor += advance + letter_spacing_pt;
        prev_gid = Some(gid);
    }

    if ops.is_empty() {
        return Ok(OutlineRun {
            ops,
            bbox: OutlineBounds::default(),
            advances_pt: advances,
        });
    }

    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for op in &ops {
        for (px, py) in op_points(op) {
            min.0 = min.0.min(px);
            min.1 = min.1.min(py);
            max.0 = max.0.max(px);
            max.1 = max.1.max(py);
        }
    }

    // Normalize the bbox corner to the origin, then move it to the anchor.
    let shift = (x_pt - min.0, y_pt - min.1);
    for op in &mut ops {
        translate_op(op, shift);
    }
    let w = max.0 - min.0;
    let h = max.1 - min.1;
    Ok(OutlineRun {
        ops,
        bbox: OutlineBounds {
            min_x: x_pt,
            min_y: y_pt,
            max_x: x_pt + w,
            max_y: y_pt + h,
            w,
            h,
        },
        advances_pt: advances,
    })
}

fn kerning_units(face: &ttf_parser::Face<'_>, left: GlyphId, right: GlyphId) -> f64 {
    let Some(kern) = face.tables().kern else {
        return 0.0;
    };
    kern.subtables
        .into_iter()
        .filter(|s| s.horizontal && !s.has_cross_stream && !s.has_state_machine)
        .filter_map(|s| s.glyphs_kerning(left, right))
        .map(f64::from)
        .sum()
}

fn op_points(op: &PathOp) -> Vec<(f64, f64)> {
    match *op {
        PathOp::MoveTo(x, y) | PathOp::LineTo(x, y) => vec![(x, y)],
        PathOp::CurveTo(x1, y1, x2, y2, x, y) => vec![(x1, y1), (x2, y2), (x, y)],
        PathOp::Close => Vec::new(),
    }
}

fn translate_op(op: &mut PathOp, (dx, dy): (f64, f64)) {
    match op {
        PathOp::MoveTo(x, y) | PathOp::LineTo(x, y) => {
            *x += dx;
            *y += dy;
        }
        PathOp::CurveTo(x1, y1, x2, y2, x, y) => {
            *x1 += dx;
            *y1 += dy;
            *x2 += dx;
            *y2 += dy;
            *x += dx;
            *y += dy;
        }
        PathOp::Close => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testfont;

    const EPS: f64 = 1e-9;

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn scale_is_size_over_units_per_em() {
        // upem 1000 at 12 pt: every glyph unit maps to 0.012 pt.
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text(&font, "A", 12.0, 0.0, 0.0).expect("outline");
        // 'A' spans glyph units x 50..450, y 0..700.
        assert!(close_to(run.bbox.w, 400.0 * 0.012));
        assert!(close_to(run.bbox.h, 700.0 * 0.012));
        assert_eq!(run.advances_pt.len(), 1);
        assert!(close_to(run.advances_pt[0], 500.0 * 0.012));
    }

    #[test]
    fn square_glyph_decomposes_to_lines() {
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text(&font, "A", 10.0, 0.0, 0.0).expect("outline");
        assert!(matches!(run.ops[0], PathOp::MoveTo(_, _)));
        assert_eq!(
            run.ops
                .iter()
                .filter(|op| matches!(op, PathOp::LineTo(_, _)))
                .count(),
            3
        );
        assert!(run.ops.iter().any(|op| matches!(op, PathOp::Close)));
        assert!(!run.ops.iter().any(|op| matches!(op, PathOp::CurveTo(..))));
    }

    #[test]
    fn quadratic_elevates_to_the_exact_cubic() {
        let font = testfont::build("Testino Sans", 0);
        // 'B': (50,0) on, (550,350) off, (50,700) on. Unit scale via
        // size == upem, anchored so glyph coordinates shift by -50 in x.
        let run = outline_text(&font, "B", 1000.0, 0.0, 0.0).expect("outline");
        let curve = run
            .ops
            .iter()
            .find_map(|op| match *op {
                PathOp::CurveTo(x1, y1, x2, y2, x, y) => Some((x1, y1, x2, y2, x, y)),
                _ => None,
            })
            .expect("cubic");
        // c1 = p0 + 2/3 (q - p0), c2 = p + 2/3 (q - p), minus bbox min x.
        assert!(close_to(curve.0, 50.0 + 2.0 / 3.0 * 500.0 - 50.0));
        assert!(close_to(curve.1, 2.0 / 3.0 * 350.0));
        assert!(close_to(curve.2, 50.0 + 2.0 / 3.0 * 500.0 - 50.0));
        assert!(close_to(curve.3, 700.0 - 2.0 / 3.0 * 350.0));
        assert!(close_to(curve.4, 0.0));
        assert!(close_to(curve.5, 700.0));
    }

    #[test]
    fn kerning_moves_the_cursor_before_drawing() {
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text(&font, "AB", 12.0, 0.0, 0.0).expect("outline");
        // Cursor before 'B' = advance(A) + kern(A,B) = (500 - 50) * 0.012;
        // B's contour starts 50 units in, and the bbox min (A's left edge,
        // also 50 units) is normalized away.
        let b_move = run
            .ops
            .iter()
            .filter_map(|op| match *op {
                PathOp::MoveTo(x, _) => Some(x),
                _ => None,
            })
            .nth(1)
            .expect("second contour start");
        assert!(close_to(b_move, (500.0 - 50.0) * 0.012));
    }

    #[test]
    fn letter_spacing_adds_to_the_cursor_after_each_glyph() {
        let font = testfont::build("Testino Sans", 0);
        let plain = outline_text_sized(
            &font,
            &[('A', 12.0), ('A', 12.0)],
            0.0,
            0.0,
            0.0,
        )
        .expect("plain");
        let spaced = outline_text_sized(
            &font,
            &[('A', 12.0), ('A', 12.0)],
            2.5,
            0.0,
            0.0,
        )
        .expect("spaced");
        assert!(close_to(spaced.bbox.w, plain.bbox.w + 2.5));
    }

    #[test]
    fn per_glyph_sizes_scale_independently() {
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text_sized(&font, &[('A', 12.0), ('A', 24.0)], 0.0, 0.0, 0.0)
            .expect("sized");
        assert!(close_to(run.advances_pt[0], 500.0 * 0.012));
        assert!(close_to(run.advances_pt[1], 500.0 * 0.024));
        // The taller second glyph sets the bbox height.
        assert!(close_to(run.bbox.h, 700.0 * 0.024));
    }

    #[test]
    fn anchor_receives_the_normalized_corner() {
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text(&font, "A", 12.0, 100.0, 200.0).expect("outline");
        assert!(close_to(run.bbox.min_x, 100.0));
        assert!(close_to(run.bbox.min_y, 200.0));
        let min_x = run
            .ops
            .iter()
            .flat_map(super::op_points)
            .map(|p| p.0)
            .fold(f64::INFINITY, f64::min);
        assert!(close_to(min_x, 100.0));
    }

    #[test]
    fn empty_text_yields_empty_run() {
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text(&font, "", 12.0, 0.0, 0.0).expect("outline");
        assert!(run.ops.is_empty());
        assert_eq!(run.bbox, OutlineBounds::default());
        assert!(run.advances_pt.is_empty());
    }

    #[test]
    fn unmapped_chars_fall_back_to_notdef_advance() {
        let font = testfont::build("Testino Sans", 0);
        let run = outline_text(&font, "Z", 12.0, 0.0, 0.0).expect("outline");
        // Glyph 0 has no outline in this font but still advances.
        assert!(run.ops.is_empty());
        assert_eq!(run.advances_pt.len(), 1);
        assert!(run.advances_pt[0] > EPS);
    }
}

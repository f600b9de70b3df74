/// The single authoritative mm→pt factor: 72 points per inch, 25.4 mm per inch.
pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

pub fn mm_to_pt(mm: f64) -> f64 {
    mm * POINTS_PER_MM
}

pub fn pt_to_mm(pt: f64) -> f64 {
    pt / POINTS_PER_MM
}

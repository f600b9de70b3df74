//! Minimal TrueType fixture font assembled byte by byte for tests.
//!
//! Three glyphs: `.notdef`, `A` (a square of straight segments) and `B`
//! (a contour with one off-curve quadratic control point), a format 4
//! cmap, a horizontal format 0 kern pair (A,B) = -50, and a
//! Windows-platform family record. Units per em is 1000.

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn head_table() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000); // version
    push_u32(&mut t, 0x0001_0000); // fontRevision
    push_u32(&mut t, 0); // checkSumAdjustment
    push_u32(&mut t, 0x5F0F_3CF5); // magicNumber
    push_u16(&mut t, 0); // flags
    push_u16(&mut t, 1000); // unitsPerEm
    t.extend_from_slice(&[0u8; 16]); // created + modified
    push_i16(&mut t, 50); // xMin
    push_i16(&mut t, 0); // yMin
    push_i16(&mut t, 550); // xMax
    push_i16(&mut t, 700); // yMax
    push_u16(&mut t, 0); // macStyle
    push_u16(&mut t, 8); // lowestRecPPEM
    push_i16(&mut t, 2); // fontDirectionHint
    push_i16(&mut t, 1); // indexToLocFormat: long
    push_i16(&mut t, 0); // glyphDataFormat
    t
}

fn hhea_table() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_i16(&mut t, 800); // ascender
    push_i16(&mut t, -200); // descender
    push_i16(&mut t, 0); // lineGap
    push_u16(&mut t, 600); // advanceWidthMax
    push_i16(&mut t, 0); // minLeftSideBearing
    push_i16(&mut t, 0); // minRightSideBearing
    push_i16(&mut t, 550); // xMaxExtent
    push_i16(&mut t, 1); // caretSlopeRise
    push_i16(&mut t, 0); // caretSlopeRun
    push_i16(&mut t, 0); // caretOffset
    for _ in 0..4 {
        push_i16(&mut t, 0);
    }
    push_i16(&mut t, 0); // metricDataFormat
    push_u16(&mut t, 3); // numberOfHMetrics
    t
}

fn maxp_table() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_u16(&mut t, 3); // numGlyphs
    push_u16(&mut t, 4); // maxPoints
    push_u16(&mut t, 1); // maxContours
    for _ in 0..2 {
        push_u16(&mut t, 0); // composite points/contours
    }
    push_u16(&mut t, 1); // maxZones
    for _ in 0..8 {
        push_u16(&mut t, 0);
    }
    t
}

fn hmtx_table() -> Vec<u8> {
    let mut t = Vec::new();
    for (advance, lsb) in [(500u16, 0i16), (500, 50), (600, 50)] {
        push_u16(&mut t, advance);
        push_i16(&mut t, lsb);
    }
    t
}

fn cmap_table() -> Vec<u8> {
    let mut t = Vec::new();
    push_u16(&mut t, 0); // version
    push_u16(&mut t, 1); // numTables
    push_u16(&mut t, 3); // platform: Windows
    push_u16(&mut t, 1); // encoding: Unicode BMP
    push_u32(&mut t, 12); // subtable offset

    // Format 4, one real segment 0x41..=0x42 with idDelta -64 (A→1, B→2)
    // plus the required 0xFFFF terminator segment.
    push_u16(&mut t, 4); // format
    push_u16(&mut t, 32); // length
    push_u16(&mut t, 0); // language
    push_u16(&mut t, 4); // segCountX2
    push_u16(&mut t, 4); // searchRange
    push_u16(&mut t, 1); // entrySelector
    push_u16(&mut t, 0); // rangeShift
    push_u16(&mut t, 0x0042); // endCode[0]
    push_u16(&mut t, 0xFFFF); // endCode[1]
    push_u16(&mut t, 0); // reservedPad
    push_u16(&mut t, 0x0041); // startCode[0]
    push_u16(&mut t, 0xFFFF); // startCode[1]
    push_u16(&mut t, 0xFFC0); // idDelta[0] = -64
    push_u16(&mut t, 0x0001); // idDelta[1]
    push_u16(&mut t, 0); // idRangeOffset[0]
    push_u16(&mut t, 0); // idRangeOffset[1]
    t
}

/// Glyph 1: square outline, on-curve points only.
fn glyph_square() -> Vec<u8> {
    let mut g = Vec::new();
    push_i16(&mut g, 1); // numberOfContours
    push_i16(&mut g, 50); // xMin
    push_i16(&mut g, 0); // yMin
    push_i16(&mut g, 450); // xMax
    push_i16(&mut g, 700); // yMax
    push_u16(&mut g, 3); // endPtsOfContours[0]
    push_u16(&mut g, 0); // instructionLength
    // (50,0) (450,0) (450,700) (50,700)
    g.extend_from_slice(&[0x33, 0x21, 0x11, 0x21]); // flags
    g.push(50); // dx short positive
    push_i16(&mut g, 400);
    push_i16(&mut g, -400);
    push_i16(&mut g, 700); // dy for point 3; others repeat
    pad4(&mut g);
    g
}

/// Glyph 2: one quadratic arc via an off-curve control point.
fn glyph_arc() -> Vec<u8> {
    let mut g = Vec::new();
    push_i16(&mut g, 1);
    push_i16(&mut g, 50);
    push_i16(&mut g, 0);
    push_i16(&mut g, 550);
    push_i16(&mut g, 700);
    push_u16(&mut g, 2); // endPtsOfContours[0]
    push_u16(&mut g, 0); // instructionLength
    // (50,0) on, (550,350) off, (50,700) on
    g.extend_from_slice(&[0x33, 0x00, 0x01]); // flags
    g.push(50);
    push_i16(&mut g, 500);
    push_i16(&mut g, -500);
    push_i16(&mut g, 350);
    push_i16(&mut g, 350);
    pad4(&mut g);
    g
}

fn kern_table() -> Vec<u8> {
    let mut t = Vec::new();
    push_u16(&mut t, 0); // version
    push_u16(&mut t, 1); // nTables
    push_u16(&mut t, 0); // subtable version
    push_u16(&mut t, 20); // subtable length
    push_u16(&mut t, 0x0001); // coverage: horizontal
    push_u16(&mut t, 1); // nPairs
    push_u16(&mut t, 6); // searchRange
    push_u16(&mut t, 0); // entrySelector
    push_u16(&mut t, 0); // rangeShift
    push_u16(&mut t, 1); // left glyph
    push_u16(&mut t, 2); // right glyph
    push_i16(&mut t, -50); // value
    t
}

fn name_table(family: &str) -> Vec<u8> {
    let utf16: Vec<u8> = family
        .encode_utf16()
        .flat_map(|u| u.to_be_bytes())
        .collect();
    let mut t = Vec::new();
    push_u16(&mut t, 0); // format
    push_u16(&mut t, 1); // count
    push_u16(&mut t, 18); // stringOffset
    push_u16(&mut t, 3); // platform: Windows
    push_u16(&mut t, 1); // encoding: Unicode BMP
    push_u16(&mut t, 0x0409); // language: en-US
    push_u16(&mut t, 1); // name id: family
    push_u16(&mut t, utf16.len() as u16);
    push_u16(&mut t, 0); // string offset
    t.extend_from_slice(&utf16);
    t
}

fn os2_table(fs_type: u16) -> Vec<u8> {
    let mut t = Vec::new();
    push_u16(&mut t, 0); // version
    push_i16(&mut t, 500); // xAvgCharWidth
    push_u16(&mut t, 400); // usWeightClass
    push_u16(&mut t, 5); // usWidthClass
    push_u16(&mut t, fs_type);
    for _ in 0..10 {
        push_i16(&mut t, 0); // sub/superscript + strikeout metrics
    }
    push_i16(&mut t, 0); // sFamilyClass
    t.extend_from_slice(&[0u8; 10]); // panose
    t.extend_from_slice(&[0u8; 16]); // ulUnicodeRange1..4
    t.extend_from_slice(b"TEST"); // achVendID
    push_u16(&mut t, 0x0040); // fsSelection: regular
    push_u16(&mut t, 0x0041); // usFirstCharIndex
    push_u16(&mut t, 0x0042); // usLastCharIndex
    push_i16(&mut t, 800); // sTypoAscender
    push_i16(&mut t, -200); // sTypoDescender
    push_i16(&mut t, 0); // sTypoLineGap
    push_u16(&mut t, 800); // usWinAscent
    push_u16(&mut t, 200); // usWinDescent
    t
}

/// Assemble the fixture font with the given family name and OS/2 fsType.
pub fn build(family: &str, fs_type: u16) -> Vec<u8> {
    let mut glyf = Vec::new();
    // Glyph 0 is empty.
    let g1_start = glyf.len() as u32;
    glyf.extend_from_slice(&glyph_square());
    let g2_start = glyf.len() as u32;
    glyf.extend_from_slice(&glyph_arc());
    let glyf_end = glyf.len() as u32;

    // Long format; glyph 0 spans 0..0 and stays empty.
    let mut loca = Vec::new();
    for offset in [0u32, g1_start, g2_start, glyf_end] {
        push_u32(&mut loca, offset);
    }

    // Directory order is ascending by tag bytes.
    let tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"OS/2", os2_table(fs_type)),
        (b"cmap", cmap_table()),
        (b"glyf", glyf),
        (b"head", head_table()),
        (b"hhea", hhea_table()),
        (b"hmtx", hmtx_table()),
        (b"kern", kern_table()),
        (b"loca", loca),
        (b"maxp", maxp_table()),
        (b"name", name_table(family)),
    ];

    let num_tables = tables.len() as u16;
    let mut font = Vec::new();
    push_u32(&mut font, 0x0001_0000); // sfnt version
    push_u16(&mut font, num_tables);
    push_u16(&mut font, 128); // searchRange
    push_u16(&mut font, 3); // entrySelector
    push_u16(&mut font, (num_tables - 8) * 16); // rangeShift

    let mut offset = 12 + 16 * num_tables as u32;
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        push_u32(&mut font, 0); // checksum, unchecked by the parser
        push_u32(&mut font, offset);
        push_u32(&mut font, data.len() as u32);
        body.extend_from_slice(data);
        pad4(&mut body);
        offset += data.len() as u32;
        offset += (4 - data.len() as u32 % 4) % 4;
    }
    font.extend_from_slice(&body);
    font
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttf_parser::GlyphId;

    #[test]
    fn fixture_font_parses_with_expected_metrics() {
        let data = build("Testino Sans", 0);
        let face = ttf_parser::Face::parse(&data, 0).expect("parse");
        assert_eq!(face.units_per_em(), 1000);
        assert_eq!(face.number_of_glyphs(), 3);
        assert_eq!(face.glyph_index('A'), Some(GlyphId(1)));
        assert_eq!(face.glyph_index('B'), Some(GlyphId(2)));
        assert_eq!(face.glyph_index('Z'), None);
        assert_eq!(face.glyph_hor_advance(GlyphId(1)), Some(500));
        assert_eq!(face.glyph_hor_advance(GlyphId(2)), Some(600));
    }

    #[test]
    fn fixture_font_exposes_the_kern_pair() {
        let data = build("Testino Sans", 0);
        let face = ttf_parser::Face::parse(&data, 0).expect("parse");
        let kern = face.tables().kern.expect("kern table");
        let value = kern
            .subtables
            .into_iter()
            .filter(|s| s.horizontal && !s.has_cross_stream && !s.has_state_machine)
            .filter_map(|s| s.glyphs_kerning(GlyphId(1), GlyphId(2)))
            .map(i32::from)
            .sum::<i32>();
        assert_eq!(value, -50);
    }

    #[test]
    fn fs_type_controls_permissions() {
        let open = build("Testino Sans", 0);
        let face = ttf_parser::Face::parse(&open, 0).expect("parse");
        assert_eq!(face.permissions(), Some(ttf_parser::Permissions::Installable));

        let locked = build("Testino Sans", 0x0002);
        let face = ttf_parser::Face::parse(&locked, 0).expect("parse");
        assert_eq!(face.permissions(), Some(ttf_parser::Permissions::Restricted));
    }
}

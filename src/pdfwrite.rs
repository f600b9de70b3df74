use crate::canvas::{Command, Document, TextRun};
use crate::error::SerialPressError;
use crate::font::FontRegistry;
use lopdf::{
    Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream,
    dictionary,
};
use std::collections::BTreeMap;
use std::fmt::Write as _;

fn lopdf_err(err: lopdf::Error) -> SerialPressError {
    SerialPressError::Pdf(format!("pdf compose error: {err}"))
}

/// First-page MediaBox extent of a PDF, walking the page tree for
/// inherited boxes. Validates the file signature first.
pub fn pdf_page_size_pt(bytes: &[u8]) -> Result<(f64, f64), SerialPressError> {
    if !crate::store::has_pdf_signature(bytes) {
        return Err(SerialPressError::InvalidAsset(
            "background pdf: expected %PDF- header".to_string(),
        ));
    }
    let doc = LoDocument::load_mem(bytes).map_err(lopdf_err)?;
    let pages = doc.get_pages();
    let Some((_, page_id)) = pages.iter().next() else {
        return Err(SerialPressError::InvalidAsset(
            "background pdf has no pages".to_string(),
        ));
    };
    let media_box = resolve_media_box(&doc, *page_id)?;
    let w = media_box[2] - media_box[0];
    let h = media_box[3] - media_box[1];
    if w <= 0.0 || h <= 0.0 {
        return Err(SerialPressError::InvalidAsset(
            "background pdf MediaBox must be > 0".to_string(),
        ));
    }
    Ok((w, h))
}

fn resolve_media_box(doc: &LoDocument, page_id: LoObjectId) -> Result<[f64; 4], SerialPressError> {
    let mut node_id = page_id;
    // Inherited attribute: climb Parent links until a MediaBox appears.
    for _ in 0..32 {
        let node = doc
            .get_object(node_id)
            .and_then(LoObject::as_dict)
            .map_err(lopdf_err)?;
        if let Ok(obj) = node.get(b"MediaBox") {
            let arr = match obj {
                LoObject::Reference(id) => doc
                    .get_object(*id)
                    .and_then(LoObject::as_array)
                    .map_err(lopdf_err)?,
                other => other.as_array().map_err(lopdf_err)?,
            };
            if arr.len() != 4 {
                return Err(SerialPressError::InvalidAsset(
                    "background pdf MediaBox missing".to_string(),
                ));
            }
            let mut out = [0.0f64; 4];
            for (i, value) in arr.iter().enumerate() {
                out[i] = value.as_float().map_err(lopdf_err)? as f64;
            }
            return Ok(out);
        }
        match node.get(b"Parent") {
            Ok(LoObject::Reference(parent)) => node_id = *parent,
            _ => break,
        }
    }
    Err(SerialPressError::InvalidAsset(
        "background pdf MediaBox missing".to_string(),
    ))
}

fn page_resources_object(doc: &LoDocument, page: &lopdf::Dictionary) -> LoObject {
    match page.get(b"Resources") {
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .cloned()
            .unwrap_or_else(|_| LoObject::Dictionary(lopdf::Dictionary::new())),
        Ok(LoObject::Dictionary(d)) => LoObject::Dictionary(d.clone()),
        _ => LoObject::Dictionary(lopdf::Dictionary::new()),
    }
}

/// Lift the first page of an external PDF into the destination document
/// as a Form XObject, deep-copying its object graph with renumbered ids.
fn import_form(dst: &mut LoDocument, src_bytes: &[u8]) -> Result<LoObjectId, SerialPressError> {
    let mut src = LoDocument::load_mem(src_bytes).map_err(lopdf_err)?;
    if src.is_encrypted() {
        return Err(SerialPressError::InvalidAsset(
            "form source pdf is encrypted".to_string(),
        ));
    }
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let pages = src.get_pages();
    let Some((_, page_id)) = pages.iter().next() else {
        return Err(SerialPressError::InvalidAsset(
            "form source pdf has no pages".to_string(),
        ));
    };
    let page_id = *page_id;
    let content = src.get_page_content(page_id).map_err(lopdf_err)?;
    let page = src
        .get_object(page_id)
        .and_then(LoObject::as_dict)
        .map_err(lopdf_err)?
        .clone();
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    let media_box = resolve_media_box(&src, page_id)?;
    let resources = page_resources_object(&src, &page);
    dst.objects.extend(src.objects);

    let mut form_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => media_box.iter().map(|v| LoObject::Real(*v as f32)).collect::<Vec<_>>(),
        "Resources" => resources,
    };
    if media_box[0] != 0.0 || media_box[1] != 0.0 {
        // Shift content so the form's own origin lands at (0, 0).
        form_dict.set(
            "Matrix",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                LoObject::Real(-media_box[0] as f32),
                LoObject::Real(-media_box[1] as f32),
            ],
        );
    }
    Ok(dst.add_object(LoStream::new(form_dict, content)))
}

struct ImageXObject {
    id: LoObjectId,
    width: u32,
    height: u32,
}

fn embed_image(
    dst: &mut LoDocument,
    data: &[u8],
    mime: &str,
) -> Result<ImageXObject, SerialPressError> {
    let decoded = image::load_from_memory(data).map_err(|err| {
        SerialPressError::InvalidInput(format!("overlay image does not decode: {err}"))
    })?;
    let (width, height) = (decoded.width(), decoded.height());

    let is_jpeg = mime.contains("jpeg") || mime.contains("jpg") || data.starts_with(&[0xFF, 0xD8]);
    let stream = if is_jpeg {
        // DCT passthrough: the decoder only supplied dimensions.
        let gray = matches!(
            decoded.color(),
            image::ColorType::L8 | image::ColorType::L16 | image::ColorType::La8
        );
        LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => if gray { "DeviceGray" } else { "DeviceRGB" },
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            data.to_vec(),
        )
        .with_compression(false)
    } else {
        let rgb = decoded.to_rgb8();
        LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        )
    };
    Ok(ImageXObject {
        id: dst.add_object(stream),
        width,
        height,
    })
}

fn embed_core_font(dst: &mut LoDocument, base_font: &str) -> LoObjectId {
    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
    };
    if base_font != "Symbol" && base_font != "ZapfDingbats" {
        dict.set("Encoding", "WinAnsiEncoding");
    }
    dst.add_object(dict)
}

fn embed_truetype_font(
    dst: &mut LoDocument,
    family: &str,
    registry: &FontRegistry,
) -> Result<LoObjectId, SerialPressError> {
    let font = registry.get(family).ok_or_else(|| {
        SerialPressError::Pdf(format!("font '{family}' has no registered bytes"))
    })?;
    let m = &font.metrics;
    let base_font: String = family.chars().filter(|c| !c.is_whitespace()).collect();

    let file_id = dst.add_object(
        LoStream::new(
            dictionary! { "Length1" => font.data.len() as i64 },
            font.data.clone(),
        ),
    );
    let descriptor_id = dst.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base_font.clone(),
        "Flags" => 32,
        "FontBBox" => vec![
            (m.bbox.0 as i64).into(),
            (m.bbox.1 as i64).into(),
            (m.bbox.2 as i64).into(),
            (m.bbox.3 as i64).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => m.ascent as i64,
        "Descent" => m.descent as i64,
        "CapHeight" => m.cap_height as i64,
        "StemV" => 80,
        "FontFile2" => file_id,
    });
    let widths: Vec<LoObject> = m.widths.iter().map(|w| (*w as i64).into()).collect();
    Ok(dst.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => base_font,
        "FirstChar" => 32,
        "LastChar" => 255,
        "Widths" => widths,
        "Encoding" => "WinAnsiEncoding",
        "FontDescriptor" => descriptor_id,
    }))
}

fn fmt(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e12 {
        return format!("{}", v as i64);
    }
    let mut s = format!("{:.6}", v);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// WinAnsiEncoding (cp1252) byte for a char. Identical to Latin-1 outside
/// 0x80..0x9F; inside that window cp1252 substitutes printable glyphs for
/// the C1 controls.
fn win_ansi_byte(ch: char) -> Option<u8> {
    match ch as u32 {
        code @ 0x00..=0x7F | code @ 0xA0..=0xFF => return Some(code as u8),
        _ => {}
    }
    let byte = match ch {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn escape_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let byte = win_ansi_byte(ch).unwrap_or(b'?');
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            _ => out.push(byte),
        }
    }
    out
}

#[derive(Default)]
struct ResourceNames {
    fonts: BTreeMap<String, String>,
    forms: BTreeMap<String, String>,
    images: BTreeMap<String, String>,
}

fn collect_font_names(document: &Document, names: &mut ResourceNames) {
    for page in &document.pages {
        for command in &page.commands {
            if let Command::ShowText { runs, .. } = command {
                for run in runs {
                    let next = names.fonts.len() + 1;
                    names
                        .fonts
                        .entry(run.font.clone())
                        .or_insert_with(|| format!("F{next}"));
                }
            }
        }
    }
}

fn emit_text_object(ops: &mut Vec<u8>, runs: &[TextRun], char_spacing: f64, names: &ResourceNames) {
    let mut head = String::from("BT\n");
    if char_spacing != 0.0 {
        let _ = writeln!(head, "{} Tc", fmt(char_spacing));
    }
    ops.extend_from_slice(head.as_bytes());
    for run in runs {
        let name = names.fonts.get(&run.font).map(String::as_str).unwrap_or("F1");
        let mut line = String::new();
        let _ = writeln!(line, "/{} {} Tf", name, fmt(run.size_pt));
        ops.extend_from_slice(line.as_bytes());
        ops.push(b'(');
        ops.extend_from_slice(&escape_text(&run.text));
        ops.extend_from_slice(b") Tj\n");
    }
    ops.extend_from_slice(b"ET\n");
}

fn emit_page_content(
    page_commands: &[Command],
    names: &ResourceNames,
    image_dims: &BTreeMap<String, (u32, u32)>,
) -> Vec<u8> {
    let mut ops: Vec<u8> = Vec::new();
    let mut push = |s: String, ops: &mut Vec<u8>| {
        ops.extend_from_slice(s.as_bytes());
        ops.push(b'\n');
    };
    for command in page_commands {
        match command {
            Command::SaveState => push("q".to_string(), &mut ops),
            Command::RestoreState => push("Q".to_string(), &mut ops),
            Command::Translate(x, y) => {
                push(format!("1 0 0 1 {} {} cm", fmt(*x), fmt(*y)), &mut ops)
            }
            Command::Scale(x, y) => push(format!("{} 0 0 {} 0 0 cm", fmt(*x), fmt(*y)), &mut ops),
            Command::Rotate(degrees) => {
                let rad = degrees.to_radians();
                let (sin, cos) = (rad.sin(), rad.cos());
                push(
                    format!(
                        "{} {} {} {} 0 0 cm",
                        fmt(cos),
                        fmt(sin),
                        fmt(-sin),
                        fmt(cos)
                    ),
                    &mut ops,
                )
            }
            Command::ClipRect {
                x,
                y,
                width,
                height,
            } => push(
                format!("{} {} {} {} re W n", fmt(*x), fmt(*y), fmt(*width), fmt(*height)),
                &mut ops,
            ),
            Command::SetFillColor(color) => push(
                format!(
                    "{} {} {} rg",
                    fmt(color.r as f64),
                    fmt(color.g as f64),
                    fmt(color.b as f64)
                ),
                &mut ops,
            ),
            Command::MoveTo { x, y } => push(format!("{} {} m", fmt(*x), fmt(*y)), &mut ops),
            Command::LineTo { x, y } => push(format!("{} {} l", fmt(*x), fmt(*y)), &mut ops),
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => push(
                format!(
                    "{} {} {} {} {} {} c",
                    fmt(*x1),
                    fmt(*y1),
                    fmt(*x2),
                    fmt(*y2),
                    fmt(*x),
                    fmt(*y)
                ),
                &mut ops,
            ),
            Command::ClosePath => push("h".to_string(), &mut ops),
            Command::Fill => push("f".to_string(), &mut ops),
            Command::ShowText { runs, char_spacing } => {
                emit_text_object(&mut ops, runs, *char_spacing, names)
            }
            Command::DrawForm { resource_id } => {
                if let Some(name) = names.forms.get(resource_id) {
                    push(format!("/{name} Do"), &mut ops);
                }
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let (Some(name), Some((iw, ih))) = (
                    names.images.get(resource_id),
                    image_dims.get(resource_id).copied(),
                ) else {
                    continue;
                };
                // Centered aspect-preserving fit inside the target box.
                let (iw, ih) = (iw as f64, ih as f64);
                let scale = (width / iw).min(height / ih);
                let dw = iw * scale;
                let dh = ih * scale;
                let dx = x + (width - dw) / 2.0;
                let dy = y + (height - dh) / 2.0;
                push(
                    format!(
                        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ",
                        fmt(dw),
                        fmt(dh),
                        fmt(dx),
                        fmt(dy),
                        name
                    ),
                    &mut ops,
                );
            }
        }
    }
    ops
}

/// Serialize a recorded document to PDF bytes. Fonts named by text
/// commands resolve against the registry; unmatched names are written as
/// core Type1 base fonts.
pub fn write_document(
    document: &Document,
    registry: &FontRegistry,
) -> Result<Vec<u8>, SerialPressError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut names = ResourceNames::default();
    collect_font_names(document, &mut names);

    let mut resources = lopdf::Dictionary::new();

    let mut font_dict = lopdf::Dictionary::new();
    for (family, name) in &names.fonts {
        let font_id = if registry.contains(family) {
            embed_truetype_font(&mut doc, family, registry)?
        } else {
            embed_core_font(&mut doc, family)
        };
        font_dict.set(name.clone(), font_id);
    }
    if !font_dict.is_empty() {
        resources.set("Font", font_dict);
    }

    let mut xobject_dict = lopdf::Dictionary::new();
    for (index, (resource_id, pdf_bytes)) in document.forms.iter().enumerate() {
        let form_id = import_form(&mut doc, pdf_bytes)?;
        let name = format!("Fm{}", index + 1);
        xobject_dict.set(name.clone(), form_id);
        names.forms.insert(resource_id.clone(), name);
    }
    let mut image_dims: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for (index, (resource_id, image)) in document.images.iter().enumerate() {
        let embedded = embed_image(&mut doc, &image.data, &image.mime)?;
        let name = format!("Im{}", index + 1);
        xobject_dict.set(name.clone(), embedded.id);
        names.images.insert(resource_id.clone(), name);
        image_dims.insert(resource_id.clone(), (embedded.width, embedded.height));
    }
    if !xobject_dict.is_empty() {
        resources.set("XObject", xobject_dict);
    }
    let resources_id = doc.add_object(resources);

    let mut kids: Vec<LoObject> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = emit_page_content(&page.commands, &names, &image_dims);
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                LoObject::Real(document.page_w_pt as f32),
                LoObject::Real(document.page_h_pt as f32),
            ],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => document.pages.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| SerialPressError::Pdf(format!("pdf compose error: {err}")))?;
    Ok(out)
}

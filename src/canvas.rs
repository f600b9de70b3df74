use crate::types::Color;
use std::collections::BTreeMap;

/// One styled run inside a text object. The series path uses one run per
/// character so every glyph can carry its own size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub font: String,
    pub size_pt: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    Translate(f64, f64),
    Scale(f64, f64),
    /// Degrees, counter-clockwise positive.
    Rotate(f64),
    ClipRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    SetFillColor(Color),
    MoveTo {
        x: f64,
        y: f64,
    },
    LineTo {
        x: f64,
        y: f64,
    },
    CurveTo {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        x: f64,
        y: f64,
    },
    ClosePath,
    Fill,
    /// A whole text object anchored at the current origin. `char_spacing`
    /// is extra advance after every glyph, on top of the font's own.
    ShowText {
        runs: Vec<TextRun>,
        char_spacing: f64,
    },
    /// Paint a registered form under the current transform, at the origin.
    DrawForm {
        resource_id: String,
    },
    /// Aspect-preserving centered fit of a registered image into the box.
    DrawImage {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        resource_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageResource {
    pub data: Vec<u8>,
    pub mime: String,
}

/// Recorded drawing program for one output file. Forms hold complete
/// external PDFs whose first page is imported at serialization time.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_w_pt: f64,
    pub page_h_pt: f64,
    pub pages: Vec<Page>,
    pub forms: BTreeMap<String, Vec<u8>>,
    pub images: BTreeMap<String, ImageResource>,
}

pub struct Canvas {
    page_w_pt: f64,
    page_h_pt: f64,
    pages: Vec<Page>,
    current: Page,
    forms: BTreeMap<String, Vec<u8>>,
    images: BTreeMap<String, ImageResource>,
}

impl Canvas {
    pub fn new(page_w_pt: f64, page_h_pt: f64) -> Self {
        Self {
            page_w_pt,
            page_h_pt,
            pages: Vec::new(),
            current: Page::new(),
            forms: BTreeMap::new(),
            images: BTreeMap::new(),
        }
    }

    /// Register an external PDF as a reusable form. The first
    /// registration of an id wins; re-registering the same content is a
    /// no-op by construction (ids are content-derived).
    pub fn register_form(&mut self, resource_id: impl Into<String>, pdf_bytes: Vec<u8>) {
        self.forms.entry(resource_id.into()).or_insert(pdf_bytes);
    }

    pub fn has_form(&self, resource_id: &str) -> bool {
        self.forms.contains_key(resource_id)
    }

    pub fn register_image(
        &mut self,
        resource_id: impl Into<String>,
        data: Vec<u8>,
        mime: impl Into<String>,
    ) {
        self.images.entry(resource_id.into()).or_insert(ImageResource {
            data,
            mime: mime.into(),
        });
    }

    pub fn save_state(&mut self) {
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        self.current.commands.push(Command::RestoreState);
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.current.commands.push(Command::Translate(x, y));
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        self.current.commands.push(Command::Scale(x, y));
    }

    pub fn rotate_deg(&mut self, degrees: f64) {
        self.current.commands.push(Command::Rotate(degrees));
    }

    pub fn clip_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.current.commands.push(Command::ClipRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.current.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.current.commands.push(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        self.current.commands.push(Command::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    pub fn close_path(&mut self) {
        self.current.commands.push(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.current.commands.push(Command::Fill);
    }

    pub fn show_text(&mut self, runs: Vec<TextRun>, char_spacing: f64) {
        self.current
            .commands
            .push(Command::ShowText { runs, char_spacing });
    }

    pub fn draw_form(&mut self, resource_id: impl Into<String>) {
        self.current.commands.push(Command::DrawForm {
            resource_id: resource_id.into(),
        });
    }

    pub fn draw_image(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        resource_id: impl Into<String>,
    ) {
        self.current.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_w_pt: self.page_w_pt,
            page_h_pt: self.page_h_pt,
            pages: self.pages,
            forms: self.forms,
            images: self.images,
        }
    }
}

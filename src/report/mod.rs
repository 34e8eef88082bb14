pub mod distribution;
pub mod pdf;
pub mod summary;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::SRError;

pub const PDF_MIME: &str = "application/pdf";

/// Approximate Helvetica advance width, in font sizes.
const CHAR_WIDTH_EM: f32 = 0.55;
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Graphs,
    Stats,
}

impl ReportKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportKind::Graphs => "graphs.pdf",
            ReportKind::Stats => "stats_summary.pdf",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Graphs => "Survey distributions",
            ReportKind::Stats => "Statistical Summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);
pub const SKY_BLUE: Rgb = Rgb(135, 206, 235);
pub const HEADER_GREEN: Rgb = Rgb(0x68, 0x9A, 0x67);

/// Rectangle in millimetres, origin at the bottom left of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A data mark, one per charted value.
    Bar { area: Area, fill: Rgb, edge: Rgb },
    Rect {
        area: Area,
        fill: Rgb,
        edge: Option<Rgb>,
    },
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        align: Align,
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub shapes: Vec<Shape>,
}

impl Page {
    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn text(&mut self, x: f32, y: f32, size: f32, bold: bool, align: Align, text: &str) {
        self.push(Shape::Text {
            x,
            y,
            size,
            bold,
            align,
            text: text.to_string(),
        });
    }

    pub fn bars(&self) -> impl Iterator<Item = &Area> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Bar { area, .. } => Some(area),
            _ => None,
        })
    }

    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Width of `text` in millimetres when set at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * CHAR_WIDTH_EM * PT_TO_MM
}

/// Shortens `text` with a trailing "..." so it fits into `width` millimetres.
pub fn fit_text(text: &str, size: f32, width: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size * CHAR_WIDTH_EM * PT_TO_MM)).floor() as usize;
    if max_chars <= 3 {
        return text.chars().take(max_chars.max(1)).collect();
    }
    let mut short: String = text.chars().take(max_chars - 3).collect();
    short.push_str("...");
    short
}

/// A packaged PDF document, held in memory until it is saved.
#[derive(Debug)]
pub struct Report {
    kind: ReportKind,
    page_count: usize,
    bytes: Vec<u8>,
}

impl Report {
    pub fn package(kind: ReportKind, pages: Vec<Page>) -> Result<Self, SRError> {
        if pages.is_empty() {
            return Err(SRError::PdfFailed("nothing to render".into()));
        }
        let bytes = pdf::write(kind.title(), &pages)?;
        Ok(Self {
            kind,
            page_count: pages.len(),
            bytes,
        })
    }

    pub fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }

    pub fn mime(&self) -> &'static str {
        PDF_MIME
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn save(self, output_dir: &Path) -> Result<PathBuf, SRError> {
        let path = output_dir.join(self.file_name());
        fs::write(&path, &self.bytes)?;
        info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

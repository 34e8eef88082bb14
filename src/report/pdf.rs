use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect,
};
use tracing::trace;

use super::{Align, Area, BLACK, Page, Rgb, Shape, text_width};
use crate::domain::SRError;

/// A4 landscape.
pub const PAGE_WIDTH: f32 = 297.0;
pub const PAGE_HEIGHT: f32 = 210.0;

const EDGE_THICKNESS: f32 = 0.6;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn pdf_error<E: std::fmt::Debug>(err: E) -> SRError {
    SRError::PdfFailed(format!("{err:?}"))
}

/// Writes `pages` into a single in-memory PDF document.
pub fn write(title: &str, pages: &[Page]) -> Result<Vec<u8>, SRError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    for (idx, page) in pages.iter().enumerate() {
        let layer = if idx == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_idx, layer_idx) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page_idx).get_layer(layer_idx)
        };
        trace!("Drawing page {} with {} shapes", idx + 1, page.shapes.len());
        draw_page(&layer, page, &fonts);
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        rgb.0 as f32 / 255.0,
        rgb.1 as f32 / 255.0,
        rgb.2 as f32 / 255.0,
        None,
    ))
}

fn rect(area: &Area, mode: PaintMode) -> Rect {
    Rect::new(
        Mm(area.x),
        Mm(area.y),
        Mm(area.x + area.width),
        Mm(area.y + area.height),
    )
    .with_mode(mode)
}

/// Built-in fonts only cover Latin-1.
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 256 { c } else { '?' })
        .collect()
}

fn draw_page(layer: &PdfLayerReference, page: &Page, fonts: &Fonts) {
    layer.set_outline_thickness(EDGE_THICKNESS);
    for shape in page.shapes.iter() {
        match shape {
            Shape::Bar { area, fill, edge } => {
                layer.set_fill_color(color(*fill));
                layer.set_outline_color(color(*edge));
                layer.add_rect(rect(area, PaintMode::FillStroke));
            }
            Shape::Rect {
                area,
                fill,
                edge: Some(edge),
            } => {
                layer.set_fill_color(color(*fill));
                layer.set_outline_color(color(*edge));
                layer.add_rect(rect(area, PaintMode::FillStroke));
            }
            Shape::Rect {
                area,
                fill,
                edge: None,
            } => {
                layer.set_fill_color(color(*fill));
                layer.add_rect(rect(area, PaintMode::Fill));
            }
            Shape::Text {
                x,
                y,
                size,
                bold,
                align,
                text,
            } => {
                let width = text_width(text, *size);
                let left = match align {
                    Align::Left => *x,
                    Align::Center => x - width / 2.0,
                    Align::Right => x - width,
                };
                let font = if *bold { &fonts.bold } else { &fonts.regular };
                layer.set_fill_color(color(BLACK));
                layer.use_text(latin1(text), *size, Mm(left), Mm(*y), font);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SKY_BLUE;

    #[test]
    fn writes_one_pdf_page_per_page() {
        let mut page = Page::default();
        page.text(10.0, 10.0, 12.0, true, Align::Center, "Distribución");
        page.push(Shape::Bar {
            area: Area {
                x: 10.0,
                y: 20.0,
                width: 5.0,
                height: 30.0,
            },
            fill: SKY_BLUE,
            edge: BLACK,
        });

        let single = write("test", std::slice::from_ref(&page)).unwrap();
        let double = write("test", &[page.clone(), page]).unwrap();
        assert!(single.starts_with(b"%PDF"));
        assert!(double.starts_with(b"%PDF"));
        assert!(double.len() > single.len());
    }

    #[test]
    fn non_latin_characters_are_replaced() {
        assert_eq!(latin1("año ∅"), "año ?");
    }
}

use super::Receipt;
use crate::config::SchoolProfile;
use crate::error::{SipesdaError, SipesdaResult};
use printpdf::*;

/// A5 portrait, the paper the office prints kwitansi on.
const PAGE_W: f32 = 148.0;
const PAGE_H: f32 = 210.0;

pub fn render_receipt_pdf(receipt: &Receipt, school: &SchoolProfile) -> SipesdaResult<Vec<u8>> {
    let (doc, page1, layer1) =
        PdfDocument::new(receipt.title(), Mm(PAGE_W), Mm(PAGE_H), "Layer 1");

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| SipesdaError::Internal(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| SipesdaError::Internal(e.to_string()))?;

    let layer = doc.get_page(page1).get_layer(layer1);
    let margin_x: f32 = 12.0;
    let mut current_y: f32 = PAGE_H - 18.0;

    let draw_line = |layer: &PdfLayerReference, y: f32| {
        let line = Line::from_iter(vec![
            (Point::new(Mm(margin_x), Mm(y)), false),
            (Point::new(Mm(PAGE_W - margin_x), Mm(y)), false),
        ]);
        layer.add_line(line);
    };

    // --- HEADER ---
    layer.use_text(school.name.as_str(), 13.0, Mm(margin_x), Mm(current_y), &bold);
    current_y -= 6.0;
    layer.use_text(school.address.as_str(), 8.0, Mm(margin_x), Mm(current_y), &font);
    current_y -= 4.5;
    layer.use_text(school.contact.as_str(), 8.0, Mm(margin_x), Mm(current_y), &font);
    current_y -= 4.0;
    draw_line(&layer, current_y);
    current_y -= 10.0;

    layer.use_text(receipt.title(), 12.0, Mm(margin_x), Mm(current_y), &bold);
    current_y -= 10.0;

    // --- FIELDS ---
    let value_x = margin_x + 40.0;
    for (label, value) in receipt.fields() {
        if label == "Petugas" {
            continue;
        }
        layer.use_text(label, 9.0, Mm(margin_x), Mm(current_y), &font);
        layer.use_text(format!(": {}", value), 9.0, Mm(value_x), Mm(current_y), &font);
        current_y -= 6.5;
    }

    // --- SIGNATURE ---
    current_y -= 8.0;
    let sign_x = PAGE_W - margin_x - 40.0;
    layer.use_text("Petugas,", 9.0, Mm(sign_x), Mm(current_y), &font);
    current_y -= 20.0;
    layer.use_text(receipt.petugas.as_str(), 9.0, Mm(sign_x), Mm(current_y), &bold);

    layer.use_text(
        format!(
            "Dicetak: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
        7.0,
        Mm(margin_x),
        Mm(8.0),
        &font,
    );

    doc.save_to_bytes()
        .map_err(|e| SipesdaError::Internal(e.to_string()))
}

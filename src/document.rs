//! Printable group document
//!
//! Export happens in two steps. [`layout`] places every line on A4 pages
//! (positions in millimetres from the top-left corner), and [`to_pdf`]
//! draws that layout with printpdf's built-in Helvetica faces. Keeping the
//! layout pure lets the pagination rules be checked without reading PDF
//! bytes back.

use crate::error::GroupError;
use crate::grouping::GroupSet;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

/// Download name of the document export
pub const PDF_FILE_NAME: &str = "auto-groups.pdf";

pub const TITLE: &str = "Auto Group Results";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;

const TOP_MARGIN_MM: f32 = 20.0;
const HEADER_X_MM: f32 = 20.0;
const ITEM_X_MM: f32 = 25.0;

const TITLE_SIZE_PT: f32 = 20.0;
const BODY_SIZE_PT: f32 = 12.0;

const TITLE_ADVANCE_MM: f32 = 15.0;
const HEADER_ADVANCE_MM: f32 = 7.0;
const ITEM_ADVANCE_MM: f32 = 6.0;
const GROUP_GAP_MM: f32 = 5.0;

// A group header never starts below this line; an item never below the next
const HEADER_BREAK_MM: f32 = 270.0;
const ITEM_BREAK_MM: f32 = 280.0;

// Helvetica averages a little over half an em per glyph
const AVERAGE_GLYPH_EM: f32 = 0.52;
const MM_PER_PT: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// One positioned line of text
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Anchor x in mm; the left edge or the centre depending on `align`
    pub x: f32,
    /// Baseline in mm from the top of the page
    pub y: f32,
    pub size: f32,
    pub weight: Weight,
    pub align: Align,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<TextLine>,
}

/// Place the title, group headers and item lines on pages
pub fn layout(groups: &GroupSet) -> Result<Vec<Page>, GroupError> {
    if groups.is_empty() {
        return Err(GroupError::NoGroupsToExport);
    }

    let mut pages = vec![Page::default()];
    let mut y = TOP_MARGIN_MM;

    pages[0].lines.push(TextLine {
        text: TITLE.to_string(),
        x: PAGE_WIDTH_MM / 2.0,
        y,
        size: TITLE_SIZE_PT,
        weight: Weight::Normal,
        align: Align::Center,
    });
    y += TITLE_ADVANCE_MM;

    for (index, group) in groups.groups().iter().enumerate() {
        if y > HEADER_BREAK_MM {
            pages.push(Page::default());
            y = TOP_MARGIN_MM;
        }
        push_line(
            &mut pages,
            TextLine {
                text: format!("Group {} ({} members):", index + 1, group.len()),
                x: HEADER_X_MM,
                y,
                size: BODY_SIZE_PT,
                weight: Weight::Bold,
                align: Align::Left,
            },
        );
        y += HEADER_ADVANCE_MM;

        for item in group {
            if y > ITEM_BREAK_MM {
                pages.push(Page::default());
                y = TOP_MARGIN_MM;
            }
            push_line(
                &mut pages,
                TextLine {
                    text: format!("  \u{2022} {}", item),
                    x: ITEM_X_MM,
                    y,
                    size: BODY_SIZE_PT,
                    weight: Weight::Normal,
                    align: Align::Left,
                },
            );
            y += ITEM_ADVANCE_MM;
        }

        y += GROUP_GAP_MM;
    }

    Ok(pages)
}

fn push_line(pages: &mut [Page], line: TextLine) {
    if let Some(page) = pages.last_mut() {
        page.lines.push(line);
    }
}

/// Render the groups as a PDF document
pub fn to_pdf(groups: &GroupSet) -> Result<Vec<u8>, GroupError> {
    let pages = layout(groups)?;
    render(&pages).map_err(GroupError::ExportFailed)
}

fn render(pages: &[Page]) -> Result<Vec<u8>, String> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Page 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| format!("{:?}", e))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| format!("{:?}", e))?;

    let mut initial = Some((first_page, first_layer));
    for (number, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = match initial.take() {
            Some(indices) => indices,
            None => doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Page {}", number + 1),
            ),
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for line in &page.lines {
            let font: &IndirectFontRef = match line.weight {
                Weight::Normal => &regular,
                Weight::Bold => &bold,
            };
            let x = match line.align {
                Align::Left => line.x,
                Align::Center => line.x - estimated_width_mm(&line.text, line.size) / 2.0,
            };
            // PDF space grows upwards from the bottom edge
            layer.use_text(
                line.text.as_str(),
                line.size,
                Mm(x),
                Mm(PAGE_HEIGHT_MM - line.y),
                font,
            );
        }
    }

    let bytes = doc.save_to_bytes().map_err(|e| format!("{:?}", e))?;
    log::debug!("rendered {} page(s) into {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}

fn estimated_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * AVERAGE_GLYPH_EM * MM_PER_PT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_text;

    fn texts(page: &Page) -> Vec<&str> {
        page.lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn small_result_fits_on_one_page() {
        let groups = group_text("Alice, Bob\nCharlie", "2").unwrap();
        let pages = layout(&groups).unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(
            texts(&pages[0]),
            vec![
                "Auto Group Results",
                "Group 1 (2 members):",
                "  \u{2022} Alice",
                "  \u{2022} Bob",
                "Group 2 (1 members):",
                "  \u{2022} Charlie",
            ]
        );
    }

    #[test]
    fn lines_follow_the_fixed_spacing() {
        let groups = group_text("A,B,C", "2").unwrap();
        let pages = layout(&groups).unwrap();
        let ys: Vec<f32> = pages[0].lines.iter().map(|line| line.y).collect();

        // title, header, two items, gap, header, item
        assert_eq!(ys, vec![20.0, 35.0, 42.0, 48.0, 59.0, 66.0]);
        assert_eq!(pages[0].lines[0].align, Align::Center);
        assert_eq!(pages[0].lines[1].weight, Weight::Bold);
        assert_eq!(pages[0].lines[1].x, 20.0);
        assert_eq!(pages[0].lines[2].x, 25.0);
    }

    #[test]
    fn long_group_breaks_after_forty_items() {
        let raw: Vec<String> = (0..50).map(|i| format!("P{}", i)).collect();
        let groups = group_text(&raw.join("\n"), "50").unwrap();
        let pages = layout(&groups).unwrap();

        assert_eq!(pages.len(), 2);
        // title + header + 40 items
        assert_eq!(pages[0].lines.len(), 42);
        assert_eq!(pages[0].lines.last().unwrap().y, 276.0);
        assert_eq!(pages[1].lines[0].text, "  \u{2022} P40");
        assert_eq!(pages[1].lines[0].y, 20.0);
        assert_eq!(pages[1].lines.len(), 10);
    }

    #[test]
    fn header_moves_to_next_page_near_the_bottom() {
        // Each 1-member group takes 7 + 6 + 5 = 18mm; the 15th header would sit at 287
        let raw: Vec<String> = (0..16).map(|i| format!("M{}", i)).collect();
        let groups = group_text(&raw.join(","), "1").unwrap();
        let pages = layout(&groups).unwrap();

        assert_eq!(pages.len(), 2);
        let first = &pages[1].lines[0];
        assert_eq!(first.text, "Group 15 (1 members):");
        assert_eq!(first.y, 20.0);
        assert!(pages[0].lines.iter().all(|line| line.y <= ITEM_BREAK_MM + ITEM_ADVANCE_MM));
    }

    #[test]
    fn empty_group_set_has_no_document() {
        assert_eq!(layout(&GroupSet::default()), Err(GroupError::NoGroupsToExport));
        assert_eq!(to_pdf(&GroupSet::default()), Err(GroupError::NoGroupsToExport));
    }

    #[test]
    fn renders_a_pdf_file() {
        let groups = group_text("A\nB\nC\nD\nE", "2").unwrap();
        let bytes = to_pdf(&groups).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}

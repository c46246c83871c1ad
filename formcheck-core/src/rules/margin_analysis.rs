use crate::types::{Document, Margins, Page};

/// Distance from the page's text block to each edge, in points.
///
/// Whitespace-only spans do not count toward the text block. Returns `None`
/// when nothing visible is on the page.
pub fn margins(page: &Page, page_width: f64, page_height: f64) -> Option<Margins> {
    let mut visible = page.spans.iter().filter(|s| !s.text.trim().is_empty());
    let first = visible.next()?;
    let block = visible.fold(first.bbox, |acc, span| acc.union(&span.bbox));

    Some(Margins {
        top: block.y0.max(0.0),
        bottom: (page_height - block.y1).max(0.0),
        left: block.x0.max(0.0),
        right: (page_width - block.x1).max(0.0),
    })
}

/// Margins of the representative (first) page, in points.
pub fn document_margins(document: &Document) -> Option<Margins> {
    let page = document.representative_page()?;
    margins(page, page.width, page.height)
}

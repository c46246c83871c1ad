//! lopdf backend
//!
//! Pure-Rust PDF extraction: lopdf parses the object graph, and the content
//! interpreter in `pdf::content` turns each page's operators into spans.

use super::PdfBackend;
use crate::preprocessors::pdf::content::{extract_spans, FontMap, PageGeometry};
use crate::preprocessors::pdf::fonts::{number, resolve, winansi_char, FontInfo};
use crate::types::{Document, DocumentMetadata, Page};
use anyhow::{bail, Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::HashMap;
use std::sync::Arc;

/// Page-tree levels searched for inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LopdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBackend for LopdfBackend {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Document> {
        let mut doc =
            lopdf::Document::load_mem(pdf_bytes).context("failed to parse PDF structure")?;

        // Owner-password-only files open with an empty user password
        let encrypted = doc.is_encrypted();
        if encrypted {
            doc.decrypt("")
                .context("document is encrypted and needs a password")?;
            tracing::debug!("Decrypted document with the empty user password");
        }

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            bail!("document has no pages");
        }

        let mut font_cache: HashMap<ObjectId, Arc<FontInfo>> = HashMap::new();
        let mut pages = Vec::with_capacity(page_ids.len());

        for (index, (&page_number, &page_id)) in page_ids.iter().enumerate() {
            let geometry = media_box(&doc, page_id).unwrap_or_else(|| {
                tracing::debug!(page = page_number, "No usable MediaBox, assuming US Letter");
                PageGeometry::letter()
            });
            let fonts = page_fonts(&doc, page_id, &mut font_cache);

            let spans = match page_operations(&doc, page_id) {
                Ok(operations) => extract_spans(&operations, &fonts, geometry),
                Err(e) => {
                    tracing::warn!(
                        page = page_number,
                        error = %format!("{e:#}"),
                        "Unreadable page content, treating page as empty"
                    );
                    Vec::new()
                }
            };

            pages.push(Page::new(index, geometry.width(), geometry.height(), spans));
        }

        let metadata = read_metadata(&doc, pages.len(), encrypted);
        Ok(Document::new(pages, metadata))
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

fn page_operations(doc: &lopdf::Document, page_id: ObjectId) -> Result<Vec<Operation>> {
    let data = doc
        .get_page_content(page_id)
        .context("failed to read content stream")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let content = Content::decode(&data).context("failed to decode content stream")?;
    Ok(content.operations)
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
fn inherited<'a>(doc: &'a lopdf::Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node: &Dictionary = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent).as_dict().ok()?;
    }
    None
}

fn media_box(doc: &lopdf::Document, page_id: ObjectId) -> Option<PageGeometry> {
    let values = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let v: Vec<f64> = values
        .iter()
        .map(|o| number(resolve(doc, o)))
        .collect::<Option<_>>()?;
    let geometry = PageGeometry::new(v[0], v[1], v[2], v[3]);
    (geometry.width() > 0.0 && geometry.height() > 0.0).then_some(geometry)
}

fn page_fonts(
    doc: &lopdf::Document,
    page_id: ObjectId,
    cache: &mut HashMap<ObjectId, Arc<FontInfo>>,
) -> FontMap {
    let mut fonts = FontMap::new();
    let Some(resources) = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok())
    else {
        return fonts;
    };
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
    else {
        return fonts;
    };

    for (name, entry) in font_dict.iter() {
        let font = match entry {
            Object::Reference(id) => cache
                .entry(*id)
                .or_insert_with(|| Arc::new(load_font(doc, entry, name)))
                .clone(),
            _ => Arc::new(load_font(doc, entry, name)),
        };
        fonts.insert(name.clone(), font);
    }
    fonts
}

fn load_font(doc: &lopdf::Document, entry: &Object, name: &[u8]) -> FontInfo {
    match resolve(doc, entry).as_dict() {
        Ok(dict) => FontInfo::from_dictionary(doc, dict),
        Err(_) => FontInfo::fallback(&String::from_utf8_lossy(name)),
    }
}

fn read_metadata(doc: &lopdf::Document, page_count: usize, encrypted: bool) -> DocumentMetadata {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok());
    let field = |key: &[u8]| -> Option<String> {
        match info?.get(key).ok().map(|o| resolve(doc, o))? {
            Object::String(bytes, _) => {
                Some(decode_text_string(bytes)).filter(|s| !s.trim().is_empty())
            }
            _ => None,
        }
    };

    DocumentMetadata {
        page_count: page_count as u32,
        pdf_version: Some(doc.version.clone()),
        title: field(b"Title"),
        author: field(b"Author"),
        creator_tool: field(b"Creator"),
        producer: field(b"Producer"),
        encrypted,
    }
}

/// PDF text strings: UTF-16BE with a byte order mark, otherwise single-byte.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().filter_map(|b| winansi_char(*b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream, StringFormat};

    fn build_pdf(page_texts: &[&str], inherit_media_box: bool) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in page_texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !inherit_media_box {
                page.set(
                    "MediaBox",
                    vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(595),
                        Object::Integer(842),
                    ],
                );
            }
            kids.push(doc.add_object(page).into());
        }

        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_texts.len() as i64,
            "Resources" => resources_id,
        };
        if inherit_media_box {
            pages.set(
                "MediaBox",
                vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            );
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set(
            "Info",
            dictionary! {
                "Title" => Object::String(b"Grant Proposal".to_vec(), StringFormat::Literal),
            },
        );

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn extracts_pages_in_order_with_inherited_resources() {
        let bytes = build_pdf(&["First page", "Second page"], true);
        let document = LopdfBackend::new().extract(&bytes).unwrap();

        assert_eq!(document.page_count(), 2);
        assert_eq!(document.pages[0].index, 0);
        assert_eq!(document.pages[1].index, 1);
        assert_eq!(document.pages[0].text(), "First page");
        assert_eq!(document.pages[1].spans[0].font_family, "Times-Roman");
        assert!((document.pages[0].width - 612.0).abs() < 1e-9);
        assert!((document.pages[0].height - 792.0).abs() < 1e-9);
    }

    #[test]
    fn page_media_box_overrides_letter_default() {
        let bytes = build_pdf(&["A4 page"], false);
        let document = LopdfBackend::new().extract(&bytes).unwrap();
        assert!((document.pages[0].width - 595.0).abs() < 1e-9);
        assert!((document.pages[0].height - 842.0).abs() < 1e-9);
    }

    #[test]
    fn reads_info_dictionary() {
        let bytes = build_pdf(&["Body"], true);
        let document = LopdfBackend::new().extract(&bytes).unwrap();
        assert_eq!(document.metadata.page_count, 1);
        assert_eq!(document.metadata.title.as_deref(), Some("Grant Proposal"));
        assert_eq!(document.metadata.pdf_version.as_deref(), Some("1.7"));
        assert!(!document.metadata.encrypted);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(LopdfBackend::new().extract(b"%PDF-1.7 garbage").is_err());
    }

    #[test]
    fn decodes_utf16_text_strings() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_string(&bytes), "Hi");
        assert_eq!(decode_text_string(b"Plain"), "Plain");
    }

    /// Marks `bytes` as encrypted with a Standard handler that has no
    /// password hashes, so no password can open it.
    fn lock(bytes: &[u8]) -> Vec<u8> {
        let mut doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.trailer.set(
            "Encrypt",
            dictionary! {
                "Filter" => "Standard",
                "V" => Object::Integer(1),
                "R" => Object::Integer(2),
                "P" => Object::Integer(-1),
            },
        );
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn undecryptable_document_is_an_error() {
        let bytes = lock(&build_pdf(&["Secret"], true));
        assert!(LopdfBackend::new().extract(&bytes).is_err());
    }

    #[test]
    fn metadata_records_encryption() {
        let bytes = build_pdf(&["Body"], true);
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(read_metadata(&doc, 1, true).encrypted);
        assert!(!read_metadata(&doc, 1, false).encrypted);
    }
}

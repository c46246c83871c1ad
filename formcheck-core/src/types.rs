use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizontal gap, as a fraction of the font size, that reads as a word break
const WORD_GAP_RATIO: f64 = 0.15;

// ===== DOCUMENT MODEL =====
// Produced once by the loader and never mutated afterwards. Every analyzer
// borrows the same Document; none of them owns or edits it.

/// A loaded document: pages in physical order plus file-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(pages: Vec<Page>, metadata: DocumentMetadata) -> Self {
        Self { pages, metadata }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page margins are measured on.
    pub fn representative_page(&self) -> Option<&Page> {
        self.pages.first()
    }

    pub fn total_spans(&self) -> usize {
        self.pages.iter().map(|p| p.spans.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 0-based, contiguous across the document
    pub index: usize,
    /// Page width in points
    pub width: f64,
    /// Page height in points
    pub height: f64,
    pub spans: Vec<TextSpan>,
}

impl Page {
    pub fn new(index: usize, width: f64, height: f64, spans: Vec<TextSpan>) -> Self {
        Self {
            index,
            width,
            height,
            spans,
        }
    }

    /// 1-based page number, as people count pages.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn is_blank(&self) -> bool {
        self.spans.iter().all(|s| s.text.trim().is_empty())
    }

    /// Concatenated page text. Spans on one line are joined with a space when
    /// there is a visible gap between them, lines are joined with a newline.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut previous: Option<&TextSpan> = None;
        for span in &self.spans {
            if let Some(prev) = previous {
                if prev.line != span.line {
                    out.push('\n');
                } else if span.bbox.x0 - prev.bbox.x1 > prev.font_size * WORD_GAP_RATIO {
                    out.push(' ');
                }
            }
            out.push_str(&span.text);
            previous = Some(span);
        }
        out
    }
}

/// A run of glyphs sharing one font family, size and line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_family: String,
    /// Effective size in points (Tf size scaled by the text and CTM matrices)
    pub font_size: f64,
    pub bbox: BoundingBox,
    /// Line number within the page, assigned by the loader in reading order
    pub line: u32,
}

impl TextSpan {
    /// Characters that count toward font weighting (whitespace excluded).
    pub fn weight(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Axis-aligned box in page space with a top-left origin: y grows downward,
/// so `y0` is the top edge and `y1` the bottom edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub page_count: u32,
    pub pdf_version: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator_tool: Option<String>,
    pub producer: Option<String>,
    pub encrypted: bool,
}

// ===== SECTIONS =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SectionTag {
    TechnicalRequirements,
    Budget,
    Qualification,
}

impl SectionTag {
    pub const ALL: [SectionTag; 3] = [
        SectionTag::TechnicalRequirements,
        SectionTag::Budget,
        SectionTag::Qualification,
    ];

    /// Key used in the report (`technical_requirements`, `budget`, ...)
    pub fn key(&self) -> &'static str {
        match self {
            SectionTag::TechnicalRequirements => "technical_requirements",
            SectionTag::Budget => "budget",
            SectionTag::Qualification => "qualification",
        }
    }

    pub fn pages_key(&self) -> String {
        format!("{}_pages", self.key())
    }

    /// Human-readable label for CLI output
    pub fn title(&self) -> &'static str {
        match self {
            SectionTag::TechnicalRequirements => "Technical Requirements",
            SectionTag::Budget => "Budget",
            SectionTag::Qualification => "Qualification",
        }
    }
}

impl fmt::Display for SectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ===== MEASURED METRICS =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
        }
    }
}

/// The (family, size) pair carrying the most characters in the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DominantFont {
    pub family: String,
    pub size: f64,
    /// Characters set in this pair
    pub weight: usize,
}

/// Distances from the text block to each page edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Margins {
    /// Rescale from points into rule units (72 points per inch by default).
    pub fn to_units(&self, points_per_unit: f64) -> Margins {
        Margins {
            top: self.top / points_per_unit,
            bottom: self.bottom / points_per_unit,
            left: self.left / points_per_unit,
            right: self.right / points_per_unit,
        }
    }

    /// Sides in report order: top, bottom, left, right
    pub fn sides(&self) -> [(&'static str, f64); 4] {
        [
            ("top", self.top),
            ("bottom", self.bottom),
            ("left", self.left),
            ("right", self.right),
        ]
    }
}

/// Everything the evaluator needs from the format analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatMetrics {
    pub file_type: FileType,
    /// `None` when the document carries no text at all
    pub dominant_font: Option<DominantFont>,
    /// In rule units; `None` when the representative page has no spans
    pub margins: Option<Margins>,
}

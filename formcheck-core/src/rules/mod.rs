// Compliance rules - one module per analysis step
// - font_analysis.rs: dominant (family, size) pair and family matching
// - margin_analysis.rs: text block distance to the page edges
// - section_detection.rs: keyword tagging of pages
// - page_counter.rs: tagged pages per section
// - evaluator.rs: metrics + counts + RuleSet -> AnalysisReport

pub mod evaluator;
pub mod font_analysis;
pub mod margin_analysis;
pub mod page_counter;
pub mod section_detection;

pub use evaluator::evaluate;
pub use font_analysis::{dominant_font, family_matches, normalize_family, FontHistogram, FontUsage};
pub use margin_analysis::{document_margins, margins};
pub use page_counter::{count, SectionCounts};
pub use section_detection::{SectionDetector, SectionTagging};

use crate::config::RuleSet;
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{Document, Page, SectionTag};
use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Tags for every page of a document, plus the pages carrying each tag.
#[derive(Debug, Clone, Serialize)]
pub struct SectionTagging {
    /// Indexed like `Document::pages`
    pub page_tags: Vec<BTreeSet<SectionTag>>,
    /// 1-based page numbers per section
    pub section_pages: BTreeMap<SectionTag, Vec<usize>>,
}

/// Lexical page tagger. Patterns are compiled once, when the detector is
/// built, so a bad pattern surfaces as a configuration error before any
/// document is loaded.
pub struct SectionDetector {
    patterns: Vec<(SectionTag, RegexSet)>,
}

impl SectionDetector {
    pub fn new(rules: &RuleSet) -> AnalysisResult<Self> {
        let mut patterns = Vec::with_capacity(rules.sections.len());
        for section in &rules.sections {
            let set = RegexSetBuilder::new(&section.keywords)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    AnalysisError::Config(format!(
                        "invalid keyword pattern for section '{}': {e}",
                        section.tag
                    ))
                })?;
            patterns.push((section.tag, set));
        }
        Ok(Self { patterns })
    }

    pub fn tag(&self, page: &Page) -> BTreeSet<SectionTag> {
        let text = page.text();
        self.patterns
            .iter()
            .filter(|(_, set)| set.is_match(&text))
            .map(|(tag, _)| *tag)
            .collect()
    }

    pub fn tag_document(&self, document: &Document) -> SectionTagging {
        let page_tags: Vec<BTreeSet<SectionTag>> =
            document.pages.iter().map(|page| self.tag(page)).collect();

        let mut section_pages: BTreeMap<SectionTag, Vec<usize>> = self
            .patterns
            .iter()
            .map(|(tag, _)| (*tag, Vec::new()))
            .collect();
        for (page, tags) in document.pages.iter().zip(&page_tags) {
            for tag in tags {
                section_pages.entry(*tag).or_default().push(page.number());
            }
        }

        tracing::debug!(
            pages = document.page_count(),
            tagged = page_tags.iter().filter(|t| !t.is_empty()).count(),
            "Tagged document sections"
        );

        SectionTagging {
            page_tags,
            section_pages,
        }
    }
}

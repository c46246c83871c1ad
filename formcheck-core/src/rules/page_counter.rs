use crate::types::SectionTag;
use std::collections::{BTreeMap, BTreeSet};

/// Number of pages carrying each section tag
pub type SectionCounts = BTreeMap<SectionTag, usize>;

/// Count tagged pages per section. Every known tag is present, zero when no
/// page carries it.
pub fn count(page_tags: &[BTreeSet<SectionTag>]) -> SectionCounts {
    let mut counts: SectionCounts = SectionTag::ALL.iter().map(|tag| (*tag, 0)).collect();
    for tags in page_tags {
        for tag in tags {
            *counts.entry(*tag).or_insert(0) += 1;
        }
    }
    counts
}

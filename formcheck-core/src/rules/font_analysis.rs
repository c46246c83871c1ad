use crate::config::{FamilyMatch, FontFamilyRule};
use crate::preprocessors::pdf::fonts::strip_subset_tag;
use crate::types::{Document, DominantFont};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sizes are paired at this resolution (0.01pt)
const SIZE_BUCKETS_PER_POINT: f64 = 100.0;

/// Character weight carried by one (family, size) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FontUsage {
    pub family: String,
    pub size: f64,
    pub weight: usize,
}

/// Character weight per (family, size) pair, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct FontHistogram {
    weights: IndexMap<(String, i64), usize>,
}

impl FontHistogram {
    pub fn from_document(document: &Document) -> Self {
        let mut weights: IndexMap<(String, i64), usize> = IndexMap::new();
        for span in document.pages.iter().flat_map(|p| p.spans.iter()) {
            let weight = span.weight();
            if weight == 0 {
                continue;
            }
            let bucket = (span.font_size * SIZE_BUCKETS_PER_POINT).round() as i64;
            *weights.entry((span.font_family.clone(), bucket)).or_insert(0) += weight;
        }
        Self { weights }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Heaviest pair; the earliest pair wins a tie.
    pub fn dominant(&self) -> Option<DominantFont> {
        let mut best: Option<(&(String, i64), usize)> = None;
        for (key, &weight) in &self.weights {
            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((key, weight));
            }
        }
        best.map(|((family, bucket), weight)| DominantFont {
            family: family.clone(),
            size: *bucket as f64 / SIZE_BUCKETS_PER_POINT,
            weight,
        })
    }

    pub fn usages(&self) -> Vec<FontUsage> {
        self.weights
            .iter()
            .map(|((family, bucket), weight)| FontUsage {
                family: family.clone(),
                size: *bucket as f64 / SIZE_BUCKETS_PER_POINT,
                weight: *weight,
            })
            .collect()
    }
}

/// The (family, size) pair carrying the most characters; `None` without text.
pub fn dominant_font(document: &Document) -> Option<DominantFont> {
    FontHistogram::from_document(document).dominant()
}

/// Comparable form of a family name: no subset tag, case, spaces, hyphens
/// or underscores.
pub fn normalize_family(name: &str) -> String {
    strip_subset_tag(name.trim())
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn family_matches(family: &str, rule: &FontFamilyRule) -> bool {
    let observed = normalize_family(family);
    if observed.is_empty() {
        return false;
    }
    std::iter::once(&rule.target)
        .chain(rule.aliases.iter())
        .map(|name| normalize_family(name))
        .filter(|name| !name.is_empty())
        .any(|name| match rule.match_mode {
            FamilyMatch::Exact => observed == name,
            FamilyMatch::Prefix => observed.starts_with(&name),
        })
}

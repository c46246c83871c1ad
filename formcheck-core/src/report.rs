use crate::rules::font_analysis::FontUsage;
use crate::types::{DocumentMetadata, FormatMetrics, SectionTag};
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// The metric could not be computed for this document
    Unevaluable,
}

impl Verdict {
    pub fn from_check(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Unevaluable => "unevaluable",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field order is the report's key order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FormatVerdicts {
    pub file_type: Verdict,
    pub font_size: Verdict,
    pub font_family: Verdict,
    pub margin: Verdict,
}

impl FormatVerdicts {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Verdict)> {
        [
            ("file_type", self.file_type),
            ("font_size", self.font_size),
            ("font_family", self.font_family),
            ("margin", self.margin),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SectionResult {
    pub tag: SectionTag,
    /// Pages carrying the tag
    pub pages: usize,
    pub max_pages: usize,
    pub verdict: Verdict,
}

/// Outcome of one analysis. Serializes as
/// `{ "format": {..}, "content": { "<section>_pages": n, "<section>": verdict, .. } }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub format: FormatVerdicts,
    /// In `SectionTag::ALL` order
    pub sections: Vec<SectionResult>,
}

impl AnalysisReport {
    pub fn section(&self, tag: SectionTag) -> Option<&SectionResult> {
        self.sections.iter().find(|s| s.tag == tag)
    }

    /// Every verdict in report order
    pub fn verdicts(&self) -> Vec<Verdict> {
        self.format
            .iter()
            .map(|(_, v)| v)
            .chain(self.sections.iter().map(|s| s.verdict))
            .collect()
    }

    /// (passed, total) over all checks
    pub fn tally(&self) -> (usize, usize) {
        let verdicts = self.verdicts();
        let passed = verdicts.iter().filter(|v| v.is_pass()).count();
        (passed, verdicts.len())
    }

    pub fn all_passed(&self) -> bool {
        self.verdicts().iter().all(Verdict::is_pass)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

struct ContentSection<'a>(&'a [SectionResult]);

impl Serialize for ContentSection<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() * 2))?;
        for section in self.0 {
            map.serialize_entry(&section.tag.pages_key(), &section.pages)?;
            map.serialize_entry(section.tag.key(), &section.verdict)?;
        }
        map.end()
    }
}

impl Serialize for AnalysisReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("format", &self.format)?;
        map.serialize_entry("content", &ContentSection(&self.sections))?;
        map.end()
    }
}

/// Report plus everything measured along the way.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedReport {
    pub report: AnalysisReport,
    /// Name of the rule set applied
    pub rule_set: String,
    pub metrics: FormatMetrics,
    pub font_usage: Vec<FontUsage>,
    /// 1-based page numbers per section
    pub section_pages: BTreeMap<SectionTag, Vec<usize>>,
    /// Why a metric came out unevaluable, and other notes
    pub diagnostics: Vec<String>,
    pub metadata: DocumentMetadata,
    pub input_sha256: String,
    pub generated_at: DateTime<Utc>,
}

impl DetailedReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

use super::font_analysis::family_matches;
use super::page_counter::SectionCounts;
use crate::config::RuleSet;
use crate::report::{AnalysisReport, FormatVerdicts, SectionResult, Verdict};
use crate::types::{FormatMetrics, SectionTag};

/// Compare measured metrics and section counts against a rule set.
///
/// Missing metrics become `Verdict::Unevaluable`. Section counts have no
/// tolerance: a count above `max_pages` fails, anything else passes unless
/// the section is required and absent.
pub fn evaluate(
    metrics: &FormatMetrics,
    counts: &SectionCounts,
    rules: &RuleSet,
) -> AnalysisReport {
    let file_type = Verdict::from_check(rules.file_type.accepted.contains(&metrics.file_type));

    let (font_size, font_family) = match &metrics.dominant_font {
        Some(font) => (
            Verdict::from_check(rules.font_size.admits(font.size)),
            Verdict::from_check(family_matches(&font.family, &rules.font_family)),
        ),
        None => (Verdict::Unevaluable, Verdict::Unevaluable),
    };

    let margin = match &metrics.margins {
        Some(margins) => {
            let side = rules.margin.side_rule();
            Verdict::from_check(margins.sides().iter().all(|(_, value)| side.admits(*value)))
        }
        None => Verdict::Unevaluable,
    };

    let sections = SectionTag::ALL
        .iter()
        .filter_map(|tag| rules.section(*tag))
        .map(|rule| {
            let pages = counts.get(&rule.tag).copied().unwrap_or(0);
            let within_budget = pages <= rule.max_pages;
            let present = pages > 0 || !rule.require_present;
            SectionResult {
                tag: rule.tag,
                pages,
                max_pages: rule.max_pages,
                verdict: Verdict::from_check(within_budget && present),
            }
        })
        .collect();

    AnalysisReport {
        format: FormatVerdicts {
            file_type,
            font_size,
            font_family,
            margin,
        },
        sections,
    }
}

use formcheck_core::{AnalysisReport, Verdict};
use std::fmt::Write;
use std::path::Path;

fn icon(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Pass => "✅",
        Verdict::Fail => "❌",
        Verdict::Unevaluable => "⚠️ ",
    }
}

/// Human-readable summary: format checks, section pages against their
/// limits, and the pass tally.
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();

    out.push_str("📋 Format checks:\n");
    for (name, verdict) in report.format.iter() {
        let _ = writeln!(out, "   {} {:.<20} {}", icon(verdict), name, verdict);
    }

    out.push_str("📑 Section page counts:\n");
    for section in &report.sections {
        let _ = writeln!(
            out,
            "   {} {:.<28} {} / {} pages",
            icon(section.verdict),
            section.tag.title(),
            section.pages,
            section.max_pages
        );
    }

    let (passed, total) = report.tally();
    let _ = writeln!(out, "🎯 {passed}/{total} compliance checks passed");
    out
}

/// `<stem>_compliance.json` next to the working directory
pub fn default_output_path(input: &str) -> String {
    let stem = Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    format!("{stem}_compliance.json")
}

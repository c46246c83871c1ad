//! Pipeline tests: PDF bytes in, report out.
//!
//! Every test builds its PDF in memory with lopdf, so no fixtures are needed.
//! Fonts carry no width tables, which makes geometry predictable: each glyph
//! advances 0.5em, a space 0.25em.
//!
//! - Boundary 1 (loader): page count, malformed input, timeouts
//! - Boundary 2 (report): verdicts, section counts, JSON contract

use formcheck_core::{
    analyze, analyze_with_rules, AnalysisError, DocumentAnalyzer, RuleSet, SectionTag, Verdict,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream, StringFormat};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::time::Duration;

// ============================================================================
// PDF helpers
// ============================================================================

struct Line {
    font: &'static str,
    size: f32,
    x: f32,
    y: f32,
    text: String,
}

fn line(font: &'static str, size: f32, x: f32, y: f32, text: &str) -> Line {
    Line {
        font,
        size,
        x,
        y,
        text: text.to_string(),
    }
}

/// Letter-size PDF; `F1` is Times-Roman, `F2` is Helvetica.
fn build_pdf(pages: &[Vec<Line>]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let times = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => times, "F2" => helvetica },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for l in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(l.font.as_bytes().to_vec()), Object::Real(l.size)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(l.x), Object::Real(l.y)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(l.text.as_bytes().to_vec(), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Resources" => resources,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Page whose text block sits about one inch from every edge: a 74-glyph
/// line at 12pt is 444pt wide.
fn page_with_left_margin(left: f32, heading: &str) -> Vec<Line> {
    vec![
        line("F2", 14.0, left, 710.0, heading),
        line("F1", 12.0, left, 690.0, &"x".repeat(74)),
        line("F1", 12.0, left, 75.0, "Page footer"),
    ]
}

fn compliant_page(heading: &str) -> Vec<Line> {
    page_with_left_margin(84.0, heading)
}

fn report_json(bytes: &[u8], rules: &RuleSet) -> Value {
    let report = analyze_with_rules(bytes, rules).unwrap();
    serde_json::from_str(&report.to_json().unwrap()).unwrap()
}

// ============================================================================
// Boundary 1: loader
// ============================================================================

mod loader_boundary {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn malformed_bytes_are_a_format_error() {
        let result = analyze(b"this is not a pdf");
        assert!(matches!(result, Err(AnalysisError::Format(_))));
    }

    #[test]
    fn truncated_pdf_is_a_format_error() {
        let bytes = build_pdf(&[compliant_page("Overview")]);
        let result = analyze(&bytes[..bytes.len() / 3]);
        assert!(matches!(result, Err(AnalysisError::Format(_))));
    }

    #[test]
    fn zero_page_pdf_is_a_format_error() {
        let bytes = build_pdf(&[]);
        assert!(matches!(analyze(&bytes), Err(AnalysisError::Format(_))));
    }

    #[test]
    fn encrypted_pdf_without_usable_password_is_a_format_error() {
        let mut doc = lopdf::Document::load_mem(&build_pdf(&[compliant_page("Budget")])).unwrap();
        doc.trailer.set(
            "Encrypt",
            dictionary! {
                "Filter" => "Standard",
                "V" => Object::Integer(1),
                "R" => Object::Integer(2),
                "P" => Object::Integer(-1),
            },
        );
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        assert!(matches!(analyze(&bytes), Err(AnalysisError::Format(_))));
    }

    #[test]
    fn zero_timeout_times_out() {
        let bytes = build_pdf(&[compliant_page("Overview")]);
        let result = DocumentAnalyzer::new().analyze_with_timeout(
            &bytes,
            &RuleSet::default(),
            Duration::ZERO,
        );
        assert!(matches!(result, Err(AnalysisError::Timeout { limit_ms: 0 })));
    }

    #[test]
    fn generous_timeout_matches_untimed_analysis() {
        let bytes = build_pdf(&[compliant_page("Overview")]);
        let analyzer = DocumentAnalyzer::new();
        let timed = analyzer
            .analyze_with_timeout(&bytes, &RuleSet::default(), Duration::from_secs(30))
            .unwrap();
        let untimed = analyzer.analyze(&bytes, &RuleSet::default()).unwrap();
        assert_eq!(timed, untimed);
    }

    #[test]
    fn pages_are_loaded_in_order() {
        let bytes = build_pdf(&[compliant_page("First"), compliant_page("Second")]);
        let stages = DocumentAnalyzer::new()
            .capture_stages(&bytes, &RuleSet::default())
            .unwrap();
        assert_eq!(stages.document.page_count(), 2);
        assert!(stages.document.pages[0].text().starts_with("First"));
        assert!(stages.document.pages[1].text().starts_with("Second"));
    }

    #[test]
    fn analyze_file_reads_from_disk() {
        let bytes = build_pdf(&[compliant_page("Overview")]);
        let path = std::env::temp_dir().join(format!("formcheck-{}.pdf", std::process::id()));
        std::fs::write(&path, &bytes).unwrap();
        let report = DocumentAnalyzer::new()
            .analyze_file(&path, &RuleSet::default())
            .unwrap();
        std::fs::remove_file(&path).ok();
        assert!(report.all_passed());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = DocumentAnalyzer::new()
            .analyze_file("/definitely/not/here.pdf", &RuleSet::default());
        assert!(matches!(result, Err(AnalysisError::Io(_))));
    }
}

// ============================================================================
// Boundary 2: format verdicts
// ============================================================================

mod format_checks {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compliant_document_passes_everything() {
        let bytes = build_pdf(&[compliant_page("Project Overview")]);
        let report = analyze(&bytes).unwrap();
        assert!(report.all_passed(), "{report:?}");
        assert_eq!(report.tally(), (7, 7));
    }

    #[test]
    fn times_roman_at_12_4_passes_font_checks() {
        let bytes = build_pdf(&[vec![
            line("F1", 12.4, 72.0, 700.0, "Body text set in Times Roman at twelve point four"),
        ]]);
        let report = analyze(&bytes).unwrap();
        assert_eq!(report.format.font_family, Verdict::Pass);
        assert_eq!(report.format.font_size, Verdict::Pass);
    }

    #[test]
    fn helvetica_body_fails_font_family() {
        let bytes = build_pdf(&[vec![line("F2", 12.0, 72.0, 700.0, "Sans serif body")]]);
        let report = analyze(&bytes).unwrap();
        assert_eq!(report.format.font_family, Verdict::Fail);
        assert_eq!(report.format.font_size, Verdict::Pass);
    }

    #[test]
    fn font_size_band_edges() {
        for (size, expected) in [
            (11.0, Verdict::Pass),
            (13.0, Verdict::Pass),
            (10.5, Verdict::Fail),
            (13.5, Verdict::Fail),
        ] {
            let bytes = build_pdf(&[vec![line("F1", size, 72.0, 700.0, "Body")]]);
            let report = analyze(&bytes).unwrap();
            assert_eq!(report.format.font_size, expected, "size {size}");
        }
    }

    #[test]
    fn dominant_font_outweighs_headings() {
        let bytes = build_pdf(&[
            vec![
                line("F2", 18.0, 72.0, 700.0, "Heading"),
                line("F1", 12.0, 72.0, 680.0, "A body paragraph that is much longer than the heading"),
            ],
            vec![line("F2", 18.0, 72.0, 700.0, "Another")],
        ]);
        let stages = DocumentAnalyzer::new()
            .capture_stages(&bytes, &RuleSet::default())
            .unwrap();
        let dominant = stages.metrics.dominant_font.unwrap();
        assert_eq!(dominant.family, "Times-Roman");
        assert_eq!(dominant.size, 12.0);
    }

    #[test]
    fn margin_within_tolerance_passes() {
        // 86pt = 1.194in
        let bytes = build_pdf(&[page_with_left_margin(86.0, "Overview")]);
        assert_eq!(analyze(&bytes).unwrap().format.margin, Verdict::Pass);
    }

    #[test]
    fn margin_past_tolerance_fails() {
        // 88pt = 1.222in
        let bytes = build_pdf(&[page_with_left_margin(88.0, "Overview")]);
        assert_eq!(analyze(&bytes).unwrap().format.margin, Verdict::Fail);
    }

    #[test]
    fn margin_tolerance_edge_is_inclusive() {
        // 1.25in = 90pt exactly
        let mut rules = RuleSet::default();
        rules.margin.tolerance = Some(formcheck_core::config::Tolerance::absolute(0.25));
        let at_edge = build_pdf(&[page_with_left_margin(90.0, "Overview")]);
        let past_edge = build_pdf(&[page_with_left_margin(91.0, "Overview")]);
        assert_eq!(
            analyze_with_rules(&at_edge, &rules).unwrap().format.margin,
            Verdict::Pass
        );
        assert_eq!(
            analyze_with_rules(&past_edge, &rules).unwrap().format.margin,
            Verdict::Fail
        );
    }

    #[test]
    fn margins_use_first_page_only() {
        let bytes = build_pdf(&[
            compliant_page("Overview"),
            vec![line("F1", 12.0, 10.0, 780.0, "Crowded second page")],
        ]);
        assert_eq!(analyze(&bytes).unwrap().format.margin, Verdict::Pass);
    }

    #[test]
    fn empty_first_page_makes_margin_unevaluable() {
        let bytes = build_pdf(&[vec![], compliant_page("Budget")]);
        let report = analyze(&bytes).unwrap();
        assert_eq!(report.format.margin, Verdict::Unevaluable);
        assert_eq!(report.format.font_family, Verdict::Pass);
        assert_eq!(report.section(SectionTag::Budget).unwrap().pages, 1);
    }
}

// ============================================================================
// Boundary 2: section page budgets
// ============================================================================

mod section_budgets {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nine_technical_pages_exceed_budget() {
        let pages: Vec<Vec<Line>> = (0..9)
            .map(|_| compliant_page("Technical Requirements"))
            .collect();
        let json = report_json(&build_pdf(&pages), &RuleSet::default());
        assert_eq!(json["content"]["technical_requirements_pages"], 9);
        assert_eq!(json["content"]["technical_requirements"], "fail");
    }

    #[test]
    fn eight_technical_pages_fit_budget() {
        let pages: Vec<Vec<Line>> = (0..8)
            .map(|_| compliant_page("Technical Specifications"))
            .collect();
        let json = report_json(&build_pdf(&pages), &RuleSet::default());
        assert_eq!(json["content"]["technical_requirements_pages"], 8);
        assert_eq!(json["content"]["technical_requirements"], "pass");
    }

    #[test]
    fn absent_budget_section_passes() {
        let bytes = build_pdf(&[compliant_page("Project Narrative"), compliant_page("Timeline")]);
        let json = report_json(&bytes, &RuleSet::default());
        assert_eq!(json["content"]["budget_pages"], 0);
        assert_eq!(json["content"]["budget"], "pass");
    }

    #[test]
    fn strict_profile_requires_sections() {
        let registry = formcheck_core::ProfileRegistry::new();
        let strict = registry.get("strict").unwrap();
        let bytes = build_pdf(&[compliant_page("Project Narrative")]);
        let report = analyze_with_rules(&bytes, strict).unwrap();
        assert_eq!(report.section(SectionTag::Budget).unwrap().verdict, Verdict::Fail);
    }

    #[test]
    fn one_page_counts_for_several_sections() {
        let bytes = build_pdf(&[compliant_page("Budget and team qualifications")]);
        let report = analyze(&bytes).unwrap();
        assert_eq!(report.section(SectionTag::Budget).unwrap().pages, 1);
        assert_eq!(report.section(SectionTag::Qualification).unwrap().pages, 1);
        assert_eq!(
            report.section(SectionTag::TechnicalRequirements).unwrap().pages,
            0
        );
    }

    #[test]
    fn custom_keywords_drive_detection() {
        let mut rules = RuleSet::default();
        rules.sections[1].keywords = vec![r"spending\s+plan".to_string()];
        let bytes = build_pdf(&[compliant_page("Spending Plan"), compliant_page("Budget")]);
        let report = analyze_with_rules(&bytes, &rules).unwrap();
        assert_eq!(report.section(SectionTag::Budget).unwrap().pages, 1);
    }
}

// ============================================================================
// Boundary 2: report contract
// ============================================================================

mod report_contract {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repeated_analysis_is_byte_identical() {
        let bytes = build_pdf(&[compliant_page("Budget"), compliant_page("Experience")]);
        let first = analyze(&bytes).unwrap().to_json().unwrap();
        let second = analyze(&bytes).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parallel_and_sequential_reports_match() {
        let bytes = build_pdf(&[compliant_page("Budget"), compliant_page("Technical Details")]);
        let mut rules = RuleSet::default();
        let parallel = analyze_with_rules(&bytes, &rules).unwrap();
        rules.parallel_analysis = false;
        let sequential = analyze_with_rules(&bytes, &rules).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn json_keys_are_in_report_order() {
        let bytes = build_pdf(&[compliant_page("Overview")]);
        let json = analyze(&bytes).unwrap().to_json().unwrap();
        let keys = [
            "\"format\"",
            "\"file_type\"",
            "\"font_size\"",
            "\"font_family\"",
            "\"margin\"",
            "\"content\"",
            "\"technical_requirements_pages\"",
            "\"technical_requirements\"",
            "\"budget_pages\"",
            "\"budget\"",
            "\"qualification_pages\"",
            "\"qualification\"",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(k).unwrap_or_else(|| panic!("missing key {k}")))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn verdict_strings_are_lowercase() {
        let bytes = build_pdf(&[vec![], compliant_page("Overview")]);
        let json = report_json(&bytes, &RuleSet::default());
        assert_eq!(json["format"]["file_type"], "pass");
        assert_eq!(json["format"]["margin"], "unevaluable");
    }

    #[test]
    fn detailed_report_carries_measurements() {
        let bytes = build_pdf(&[compliant_page("Overview"), compliant_page("Budget")]);
        let detailed = DocumentAnalyzer::new()
            .analyze_detailed(&bytes, &RuleSet::default())
            .unwrap();
        assert_eq!(detailed.section_pages[&SectionTag::Budget], vec![2]);
        assert_eq!(detailed.metadata.page_count, 2);
        assert_eq!(detailed.input_sha256.len(), 64);
        assert!(detailed.diagnostics.is_empty());
        assert_eq!(detailed.font_usage[0].family, "Helvetica");

        let json: Value = serde_json::from_str(&detailed.to_json().unwrap()).unwrap();
        assert_eq!(json["report"]["content"]["budget_pages"], 1);
        assert_eq!(json["section_pages"]["budget"][0], 2);
    }
}

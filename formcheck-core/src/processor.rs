use crate::config::RuleSet;
use crate::error::{AnalysisError, AnalysisResult};
use crate::preprocessors::{PdfPreprocessor, Preprocessor};
use crate::report::{AnalysisReport, DetailedReport};
use crate::rules::{
    count, document_margins, evaluate, FontHistogram, FontUsage, SectionCounts, SectionDetector,
    SectionTagging,
};
use crate::types::*;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Captured intermediate outputs from each pipeline stage
/// Used for testing and diagnostics: lets you inspect/compare each boundary
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStages {
    pub document: Document,
    pub font_usage: Vec<FontUsage>,
    pub tagging: SectionTagging,
    pub counts: SectionCounts,
    pub metrics: FormatMetrics,
    pub report: AnalysisReport,
}

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.timings.push((step_name.to_string(), elapsed));
        println!("⏱️  {}: {:.0}ms", step_name, elapsed.as_millis());

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn print_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        println!("\n📊 Performance Summary:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            println!(
                "   {:.<35} {:.0}ms ({:.1}%)",
                step,
                duration.as_millis(),
                percentage
            );
        }
        println!("   {:.<35} {:.0}ms", "Total", total.as_millis());
    }
}

/// Everything the analyzers measured on one document
struct Measurements {
    histogram: FontHistogram,
    /// In points
    margins: Option<Margins>,
    tagging: SectionTagging,
}

/// Runs the load → measure → evaluate pipeline.
///
/// Holds no per-document state: one analyzer can serve any number of
/// documents and rule sets, from any number of threads.
pub struct DocumentAnalyzer {
    preprocessor: Arc<dyn Preprocessor>,
}

impl DocumentAnalyzer {
    pub fn new() -> Self {
        Self::with_preprocessor(Box::new(PdfPreprocessor::new()))
    }

    /// Create DocumentAnalyzer with an injected preprocessor
    pub fn with_preprocessor(preprocessor: Box<dyn Preprocessor>) -> Self {
        Self {
            preprocessor: Arc::from(preprocessor),
        }
    }

    pub fn preprocessor_name(&self) -> &str {
        self.preprocessor.name()
    }

    /// Analyze PDF bytes. Honors `rules.load_timeout_ms` when set.
    pub fn analyze(&self, bytes: &[u8], rules: &RuleSet) -> AnalysisResult<AnalysisReport> {
        let timeout = rules.load_timeout_ms.map(Duration::from_millis);
        let stages = self.run(bytes, rules, timeout, &mut StepProfiler::new(false))?;
        Ok(stages.report)
    }

    /// Analyze with an explicit bound on document loading.
    pub fn analyze_with_timeout(
        &self,
        bytes: &[u8],
        rules: &RuleSet,
        timeout: Duration,
    ) -> AnalysisResult<AnalysisReport> {
        let stages = self.run(bytes, rules, Some(timeout), &mut StepProfiler::new(false))?;
        Ok(stages.report)
    }

    pub fn analyze_file(
        &self,
        input: impl AsRef<Path>,
        rules: &RuleSet,
    ) -> AnalysisResult<AnalysisReport> {
        let bytes = std::fs::read(input.as_ref())?;
        self.analyze(&bytes, rules)
    }

    pub fn analyze_detailed(&self, bytes: &[u8], rules: &RuleSet) -> AnalysisResult<DetailedReport> {
        self.analyze_detailed_with_profiler(bytes, rules, &mut StepProfiler::new(false))
    }

    /// Detailed analysis with step timings recorded in `profiler`.
    pub fn analyze_detailed_with_profiler(
        &self,
        bytes: &[u8],
        rules: &RuleSet,
        profiler: &mut StepProfiler,
    ) -> AnalysisResult<DetailedReport> {
        let timeout = rules.load_timeout_ms.map(Duration::from_millis);
        let input_sha256 = profiler.time_step("Input Fingerprint", || sha256_hex(bytes));
        let stages = self.run(bytes, rules, timeout, profiler)?;
        let diagnostics = diagnostics(&stages);

        Ok(DetailedReport {
            report: stages.report,
            rule_set: rules.name.clone(),
            metrics: stages.metrics,
            font_usage: stages.font_usage,
            section_pages: stages.tagging.section_pages,
            diagnostics,
            metadata: stages.document.metadata,
            input_sha256,
            generated_at: chrono::Utc::now(),
        })
    }

    /// Run the pipeline and keep every intermediate output
    pub fn capture_stages(&self, bytes: &[u8], rules: &RuleSet) -> AnalysisResult<PipelineStages> {
        let timeout = rules.load_timeout_ms.map(Duration::from_millis);
        let stages = self.run(bytes, rules, timeout, &mut StepProfiler::new(false))?;
        println!(
            "📋 Stage 1: {} pages, {} spans captured",
            stages.document.page_count(),
            stages.document.total_spans()
        );
        println!("📋 Stage 2: {} font pairs measured", stages.font_usage.len());
        println!(
            "📋 Stage 3: {} tagged pages",
            stages.tagging.page_tags.iter().filter(|t| !t.is_empty()).count()
        );
        Ok(stages)
    }

    fn run(
        &self,
        bytes: &[u8],
        rules: &RuleSet,
        timeout: Option<Duration>,
        profiler: &mut StepProfiler,
    ) -> AnalysisResult<PipelineStages> {
        // Rule problems surface before any document work
        rules.validate()?;
        let detector = SectionDetector::new(rules)?;

        let document = profiler.time_step("1. PDF → Document", || self.load(bytes, timeout))?;
        tracing::info!(
            pages = document.page_count(),
            spans = document.total_spans(),
            rules = %rules.name,
            "Document loaded"
        );

        let measurements = profiler.time_step("2. Font / Margin / Section Analysis", || {
            measure(&document, &detector, rules.parallel_analysis)
        });

        let metrics = FormatMetrics {
            file_type: FileType::Pdf,
            dominant_font: measurements.histogram.dominant(),
            margins: measurements
                .margins
                .map(|m| m.to_units(rules.margin.points_per_unit)),
        };
        let counts = count(&measurements.tagging.page_tags);

        let report = profiler.time_step("3. Evaluation", || evaluate(&metrics, &counts, rules));
        let (passed, total) = report.tally();
        tracing::debug!(passed, total, "Evaluation complete");

        Ok(PipelineStages {
            document,
            font_usage: measurements.histogram.usages(),
            tagging: measurements.tagging,
            counts,
            metrics,
            report,
        })
    }

    /// Load on a worker thread when a bound is given; the caller stops
    /// waiting at the bound and the worker's late result is dropped.
    fn load(&self, bytes: &[u8], timeout: Option<Duration>) -> AnalysisResult<Document> {
        let Some(limit) = timeout else {
            return self.preprocessor.load(bytes);
        };
        let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        if limit.is_zero() {
            return Err(AnalysisError::Timeout { limit_ms });
        }

        let preprocessor = Arc::clone(&self.preprocessor);
        let owned = bytes.to_vec();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("formcheck-loader".to_string())
            .spawn(move || {
                // Receiver may be gone after a timeout
                let _ = tx.send(preprocessor.load(&owned));
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(limit_ms, "Document loading timed out");
                Err(AnalysisError::Timeout { limit_ms })
            }
            Err(RecvTimeoutError::Disconnected) => Err(AnalysisError::Format(
                "loader stopped without producing a document".to_string(),
            )),
        }
    }
}

impl Default for DocumentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn measure(document: &Document, detector: &SectionDetector, parallel: bool) -> Measurements {
    if parallel {
        let ((histogram, margins), tagging) = rayon::join(
            || {
                rayon::join(
                    || FontHistogram::from_document(document),
                    || document_margins(document),
                )
            },
            || detector.tag_document(document),
        );
        Measurements {
            histogram,
            margins,
            tagging,
        }
    } else {
        Measurements {
            histogram: FontHistogram::from_document(document),
            margins: document_margins(document),
            tagging: detector.tag_document(document),
        }
    }
}

fn diagnostics(stages: &PipelineStages) -> Vec<String> {
    let mut notes = Vec::new();
    if stages.metrics.dominant_font.is_none() {
        notes.push("No text found in the document; font checks are unevaluable".to_string());
    }
    if stages.metrics.margins.is_none() {
        notes.push("First page carries no visible text; margin check is unevaluable".to_string());
    }
    let blank: Vec<String> = stages
        .document
        .pages
        .iter()
        .filter(|p| p.is_blank())
        .map(|p| p.number().to_string())
        .collect();
    if !blank.is_empty() {
        notes.push(format!("Pages without text: {}", blank.join(", ")));
    }
    notes
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

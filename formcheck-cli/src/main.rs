use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

// Import from formcheck-core
use formcheck_core::{DocumentAnalyzer, PipelineStages, ProfileRegistry, RuleSet, StepProfiler};

// Import CLI utilities
use formcheck::{default_output_path, render_summary};

#[derive(Parser)]
#[command(name = "formcheck")]
#[command(about = "Check a PDF against font, margin and section page-budget rules")]
struct Args {
    /// Path to the PDF file to analyze
    #[arg(short, long, required_unless_present_any = ["show_configs", "print_default_config"])]
    input: Option<String>,

    /// Path to a rule set file (YAML format)
    #[arg(short, long, conflicts_with = "profile")]
    config: Option<String>,

    /// Named built-in rule set (default, strict)
    #[arg(long)]
    profile: Option<String>,

    /// Output file path (if not specified, <input stem>_compliance.json)
    #[arg(short, long)]
    output: Option<String>,

    /// Write the detailed report (metrics, font usage, section pages, diagnostics)
    #[arg(long)]
    details: bool,

    /// Upper bound on document loading, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Run the analyzers one after another instead of concurrently
    #[arg(long)]
    sequential: bool,

    /// Print timings of each pipeline step
    #[arg(long)]
    profile_steps: bool,

    /// Dump all intermediate pipeline stage outputs to a directory
    /// Captures: Document, font usage, section tags and the final report
    #[arg(long)]
    dump_stages: bool,

    /// Directory for stage dump output
    #[arg(long, default_value = "test_outputs/stages")]
    stages_dir: String,

    /// Show available rule sets and options, then exit
    #[arg(long)]
    show_configs: bool,

    /// Print the default rule set as YAML, then exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("❌ Analysis failed: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let registry = ProfileRegistry::new();

    if args.show_configs {
        show_help(&registry);
        return Ok(());
    }

    if args.print_default_config {
        print!("{}", RuleSet::default().to_yaml()?);
        return Ok(());
    }

    println!("🦀 Formcheck PDF Compliance Analyzer");

    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("--input is required"))?;

    let mut rules = load_rules(args, &registry)?;
    if let Some(timeout_ms) = args.timeout_ms {
        rules.load_timeout_ms = Some(timeout_ms);
    }
    if args.sequential {
        rules.parallel_analysis = false;
    }

    let bytes = fs::read(input).with_context(|| format!("failed to read {input}"))?;
    println!("📄 Analyzing: {input}");

    let analyzer = DocumentAnalyzer::new();

    // Stage dump mode: capture and save all intermediates
    if args.dump_stages {
        println!("\n🔬 Pipeline stage dump mode");
        let stages = analyzer.capture_stages(&bytes, &rules)?;
        save_stages(&stages, input, &args.stages_dir)?;
        println!("\n✅ All stages dumped to: {}", args.stages_dir);
        return Ok(());
    }

    let mut profiler = StepProfiler::new(args.profile_steps);
    let detailed = analyzer.analyze_detailed_with_profiler(&bytes, &rules, &mut profiler)?;
    profiler.print_summary();

    println!("\n{}", render_summary(&detailed.report));
    for note in &detailed.diagnostics {
        println!("ℹ️  {note}");
    }

    let json = if args.details {
        detailed.to_json()?
    } else {
        detailed.report.to_json()?
    };
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    fs::write(&output_path, json).with_context(|| format!("failed to write {output_path}"))?;
    println!("💾 Report saved to: {output_path}");

    Ok(())
}

fn load_rules(args: &Args, registry: &ProfileRegistry) -> Result<RuleSet> {
    if let Some(config_path) = &args.config {
        let rules = RuleSet::load_from_file(config_path)?;
        println!("📋 Loaded rules from: {config_path}");
        return Ok(rules);
    }
    if let Some(name) = &args.profile {
        let rules = registry.get(name).cloned().ok_or_else(|| {
            anyhow!(
                "unknown profile '{name}' (available: {})",
                registry.names().join(", ")
            )
        })?;
        println!("📋 Using profile: {name}");
        return Ok(rules);
    }
    println!("📋 Using default rules");
    Ok(RuleSet::default())
}

fn show_help(registry: &ProfileRegistry) {
    println!("\n📋 Available Options:");
    println!("  --input <path>          PDF file to analyze");
    println!("  --config <path>         Load a rule set from YAML");
    println!("  --profile <name>        Use a built-in rule set");
    println!("  --output <path>         Report path (default: <stem>_compliance.json)");
    println!("  --details               Write metrics, font usage and diagnostics too");
    println!("  --timeout-ms <n>        Give up on loading after n milliseconds");
    println!("  --sequential            Disable concurrent analysis");
    println!("  --profile-steps         Print per-step timings");
    println!("  --print-default-config  Print the default rule set as YAML");

    println!("\n📁 Built-in profiles:");
    for name in registry.names() {
        if let Some(rules) = registry.get(name) {
            println!(
                "  {:<10} font {}pt, margin {}in, sections: {}",
                name,
                rules.font_size.target,
                rules.margin.target,
                rules
                    .sections
                    .iter()
                    .map(|s| format!("{} ≤ {}", s.tag, s.max_pages))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    println!("\n📝 Usage Examples:");
    println!("  formcheck -i proposal.pdf");
    println!("  formcheck -i proposal.pdf --profile strict --details");
    println!("  formcheck -i proposal.pdf -c configs/default.yaml -o report.json");
    println!("  RUST_LOG=formcheck_core=debug formcheck -i proposal.pdf");
}

fn save_stages(stages: &PipelineStages, input: &str, output_dir: &str) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    let dir = Path::new(output_dir);

    // Stage 1: Loaded document
    let doc_path = dir.join("stage1_document.json");
    fs::write(&doc_path, serde_json::to_string_pretty(&stages.document)?)?;
    println!(
        "  💾 {} ({} pages)",
        doc_path.display(),
        stages.document.page_count()
    );

    // Stage 2: Font usage
    let fonts_path = dir.join("stage2_font_usage.json");
    fs::write(&fonts_path, serde_json::to_string_pretty(&stages.font_usage)?)?;
    println!(
        "  💾 {} ({} font pairs)",
        fonts_path.display(),
        stages.font_usage.len()
    );

    // Stage 3: Section tags
    let tags_path = dir.join("stage3_section_tags.json");
    fs::write(&tags_path, serde_json::to_string_pretty(&stages.tagging)?)?;
    println!("  💾 {}", tags_path.display());

    // Stage 4: Final report
    let report_path = dir.join("stage4_report.json");
    fs::write(&report_path, stages.report.to_json()?)?;
    println!("  💾 {}", report_path.display());

    // Summary file: quick reference for validation scripts
    let (passed, total) = stages.report.tally();
    let summary = serde_json::json!({
        "input_pdf": input,
        "captured_at": chrono::Utc::now().to_rfc3339(),
        "stage_counts": {
            "pages": stages.document.page_count(),
            "spans": stages.document.total_spans(),
            "font_pairs": stages.font_usage.len(),
            "checks_passed": passed,
            "checks_total": total,
        }
    });
    let summary_path = dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    println!("  💾 {}", summary_path.display());

    Ok(())
}

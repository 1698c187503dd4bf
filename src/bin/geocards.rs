//! CLI binary for geocards.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use geocards::pipeline::compile::default_backends;
use geocards::pipeline::headers::LinePrompter;
use geocards::pipeline::links;
use geocards::pipeline::qr::{self, QrOptions};
use geocards::pipeline::template::UnknownPlaceholder;
use geocards::{
    compile_cards, generate, CompileOutcome, DocumentOptions, DocumentOutput, GenerationConfig,
    GenerationOutput, GenerationProgressCallback, ProgressCallback, RowWarning, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one bar reused for every stage, with warnings
/// printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Reading table…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS)
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>10}  \
             [{bar:42.green/238}] {pos:>4}/{len} rows  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_rows: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating cards for {total_rows} submissions…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage, total: usize) {
        match stage {
            Stage::Links | Stage::QrCodes | Stage::Cards => {
                self.bar.set_style(Self::bar_style());
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
                self.bar.set_message("");
            }
            Stage::Headers | Stage::Document | Stage::Compile => {
                self.bar.set_style(Self::spinner_style());
                self.bar.set_message("");
            }
        }
        self.bar.set_prefix(stage.to_string());
    }

    fn on_row_complete(&self, _stage: Stage, row: usize, _total: usize, id: &str) {
        self.bar.set_position(row as u64);
        self.bar.set_message(dim(id));
    }

    fn on_row_warning(&self, _id: &str, message: &str) {
        self.bar.println(format!("  {} {}", yellow("⚠"), message));
    }

    fn on_compile_attempt(&self, backend: &str) {
        self.bar.set_message(format!("trying {backend}…"));
    }

    fn on_run_complete(&self, total_rows: usize, warning_count: usize) {
        self.bar.finish_and_clear();
        if warning_count == 0 {
            eprintln!(
                "{} {} cards generated",
                green("✔"),
                bold(&total_rows.to_string())
            );
        } else {
            eprintln!(
                "{} {} cards generated  ({} warnings)",
                cyan("⚠"),
                bold(&total_rows.to_string()),
                yellow(&warning_count.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run with the built-in templates
  geocards run -i survey_export.csv

  # Custom templates and output locations
  geocards run -i survey.csv --card-template card.md \
      --document-template cards.tex --output-dir build --qr-dir build/qr

  # Produce the .tex only (no LaTeX installed)
  geocards run -i survey.csv --skip-compile

  # Fix mismatched column names interactively and remember the answers
  geocards run -i survey.csv --interactive --mapping header_mapping.json

  # Links only, zoomed out
  geocards links survey.csv -z 15

  # One QR code
  geocards qr "https://www.google.com/maps?q=44.97,-93.49&t=k&z=18" qr.png

  # Rebuild the PDF after hand-editing cards
  geocards compile --cards-dir output/cards

EXTERNAL TOOLS:
  PDF output tries pandoc first, then the LaTeX engine directly
  (xelatex unless --engine says otherwise). Either must be on PATH.

ENVIRONMENT VARIABLES:
  GEOCARDS_INPUT             Input CSV for `run`
  GEOCARDS_OUTPUT_DIR        Output directory (default: output)
  GEOCARDS_QR_DIR            QR image directory (default: qr_codes)
  GEOCARDS_ZOOM              Map zoom level (default: 18)
  GEOCARDS_ENGINE            LaTeX engine (default: xelatex)
  GEOCARDS_MAPPING           Header-mapping JSON file
  RUST_LOG                   Log filter, overrides -v/-q
"#;

/// Turn a survey CSV of geo-tagged submissions into printable QR cards.
#[derive(Parser, Debug)]
#[command(
    name = "geocards",
    version,
    about = "Turn a survey CSV of geo-tagged submissions into printable QR cards",
    long_about = "Builds a map link per row, renders a QR code for it, fills a card template \
per row and compiles all cards into one printable PDF via pandoc or a LaTeX engine.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "GEOCARDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "GEOCARDS_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "GEOCARDS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline: headers, links, QR codes, cards, PDF.
    Run(RunArgs),
    /// Add a WebLink column to a CSV and write it out.
    Links(LinksArgs),
    /// Render a single QR code image.
    Qr(QrArgs),
    /// Render and compile an existing card directory.
    Compile(CompileArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input CSV of submissions.
    #[arg(short, long, env = "GEOCARDS_INPUT")]
    input: PathBuf,

    /// Markdown card template. Built-in template if omitted.
    #[arg(long, env = "GEOCARDS_CARD_TEMPLATE")]
    card_template: Option<PathBuf>,

    /// LaTeX document template. Created with the built-in template if missing.
    #[arg(long, env = "GEOCARDS_DOCUMENT_TEMPLATE")]
    document_template: Option<PathBuf>,

    /// Directory for the links table, cards and document.
    #[arg(long, env = "GEOCARDS_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Directory for QR images and qr_metadata.csv.
    #[arg(long, env = "GEOCARDS_QR_DIR", default_value = "qr_codes")]
    qr_dir: PathBuf,

    /// Final PDF path [default: <output-dir>/printable_cards.pdf].
    #[arg(long, env = "GEOCARDS_OUTPUT_PDF")]
    output_pdf: Option<PathBuf>,

    /// Map zoom level.
    #[arg(long, env = "GEOCARDS_ZOOM", default_value_t = geocards::config::DEFAULT_ZOOM)]
    zoom: u32,

    /// QR module size in pixels.
    #[arg(long, env = "GEOCARDS_BOX_SIZE", default_value_t = geocards::config::DEFAULT_BOX_SIZE,
          value_parser = clap::value_parser!(u32).range(1..))]
    box_size: u32,

    /// Write the .tex document but do not compile it.
    #[arg(long, env = "GEOCARDS_SKIP_COMPILE")]
    skip_compile: bool,

    /// Header-mapping JSON: applied when it exists, written after --interactive fixes.
    #[arg(long, env = "GEOCARDS_MAPPING")]
    mapping: Option<PathBuf>,

    /// Ask which column to use for each missing header (needs a terminal).
    #[arg(long, env = "GEOCARDS_INTERACTIVE")]
    interactive: bool,

    /// Fail on template placeholders and variables with no value.
    #[arg(long, env = "GEOCARDS_STRICT_TEMPLATES")]
    strict_templates: bool,

    /// LaTeX engine for both compiler backends.
    #[arg(long, env = "GEOCARDS_ENGINE", default_value = geocards::config::DEFAULT_LATEX_ENGINE)]
    engine: String,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "GEOCARDS_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct LinksArgs {
    /// Input CSV with x/y columns.
    csv: PathBuf,

    /// Output CSV [default: <stem>_with_links.csv next to the input].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Map zoom level.
    #[arg(short, long, env = "GEOCARDS_ZOOM", default_value_t = geocards::config::DEFAULT_ZOOM)]
    zoom: u32,
}

#[derive(Args, Debug)]
struct QrArgs {
    /// Text to encode, usually a URL.
    data: String,

    /// PNG file to write.
    output: PathBuf,

    /// Module size in pixels.
    #[arg(long, env = "GEOCARDS_BOX_SIZE", default_value_t = geocards::config::DEFAULT_BOX_SIZE,
          value_parser = clap::value_parser!(u32).range(1..))]
    size: u32,
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Directory of card_<id>.md files.
    #[arg(long, env = "GEOCARDS_CARDS_DIR")]
    cards_dir: PathBuf,

    /// LaTeX document template. Created with the built-in template if missing.
    #[arg(long, env = "GEOCARDS_DOCUMENT_TEMPLATE")]
    document_template: Option<PathBuf>,

    /// Final PDF path.
    #[arg(long, env = "GEOCARDS_OUTPUT_PDF", default_value = "output/printable_cards.pdf")]
    output_pdf: PathBuf,

    /// Directory the QR images are read from.
    #[arg(long, env = "GEOCARDS_QR_DIR", default_value = "qr_codes")]
    qr_dir: PathBuf,

    /// Write the .tex document but do not compile it.
    #[arg(long, env = "GEOCARDS_SKIP_COMPILE")]
    skip_compile: bool,

    /// Fail on template variables with no value.
    #[arg(long, env = "GEOCARDS_STRICT_TEMPLATES")]
    strict_templates: bool,

    /// LaTeX engine for both compiler backends.
    #[arg(long, env = "GEOCARDS_ENGINE", default_value = geocards::config::DEFAULT_LATEX_ENGINE)]
    engine: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let json = matches!(&cli.command, Command::Run(a) if a.json);
    let interactive = matches!(&cli.command, Command::Run(a) if a.interactive);
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !json
        && !interactive
        && matches!(cli.command, Command::Run(_))
        && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
            } else {
                None
            };
            run(args, progress, cli.quiet)
        }
        Command::Links(args) => {
            let out = links::process_table(&args.csv, args.output.as_deref(), args.zoom)
                .context("Link generation failed")?;
            if !cli.quiet {
                eprintln!("{}  {}", green("✔"), bold(&out.display().to_string()));
            }
            Ok(())
        }
        Command::Qr(args) => {
            qr::write_qr(&args.data, &args.output, QrOptions { box_size: args.size })
                .context("QR generation failed")?;
            if !cli.quiet {
                eprintln!("{}  {}", green("✔"), bold(&args.output.display().to_string()));
            }
            Ok(())
        }
        Command::Compile(args) => {
            let backends = default_backends(&args.engine);
            let doc = compile_cards(
                &args.cards_dir,
                &DocumentOptions {
                    document_template: args.document_template.as_deref(),
                    qr_dir: &args.qr_dir,
                    output_pdf: &args.output_pdf,
                    skip_compile: args.skip_compile,
                    strict_templates: args.strict_templates,
                    backends: &backends,
                    progress: None,
                },
            )
            .context("Document compilation failed")?;
            if !cli.quiet {
                print_document(&doc);
                print_warnings(&doc.warnings);
            }
            Ok(())
        }
    }
}

/// Full pipeline: map `run` flags to `GenerationConfig` and report.
fn run(args: RunArgs, progress: Option<ProgressCallback>, quiet: bool) -> Result<()> {
    let mut builder = GenerationConfig::builder()
        .input(args.input)
        .output_dir(args.output_dir)
        .qr_dir(args.qr_dir)
        .zoom(args.zoom)
        .box_size(args.box_size)
        .skip_compile(args.skip_compile)
        .latex_engine(args.engine);

    if let Some(path) = args.card_template {
        builder = builder.card_template(path);
    }
    if let Some(path) = args.document_template {
        builder = builder.document_template(path);
    }
    if let Some(path) = args.output_pdf {
        builder = builder.output_pdf(path);
    }
    if let Some(path) = args.mapping {
        builder = builder.mapping(path);
    }
    if args.strict_templates {
        builder = builder.unknown_placeholders(UnknownPlaceholder::Error);
    }
    if args.interactive {
        if io::stdin().is_terminal() {
            builder = builder.prompter(Arc::new(LinePrompter::stdio()));
        } else {
            tracing::warn!("--interactive ignored: stdin is not a terminal");
        }
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;
    let output = generate(&config).context("Card generation failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !quiet {
        // The progress callback already printed the headline.
        if config.progress_callback.is_none() {
            eprintln!(
                "{} {} cards generated",
                green("✔"),
                bold(&output.stats.cards.to_string())
            );
        }
        print_summary(&output);
    }
    Ok(())
}

fn print_summary(output: &GenerationOutput) {
    let row = |label: &str, value: String| eprintln!("   {:<10} {}", dim(label), value);
    row("links", output.links_table.display().to_string());
    row(
        "qr codes",
        format!(
            "{} images, {}",
            output.qr_codes.len(),
            output.qr_metadata.display()
        ),
    );
    row(
        "cards",
        format!("{} files in {}", output.cards.len(), output.cards_dir.display()),
    );
    print_document(&output.document);
    eprintln!(
        "   {}",
        dim(&format!(
            "qr {}ms  compile {}ms  total {}ms",
            output.stats.qr_duration_ms,
            output.stats.compile_duration_ms,
            output.stats.total_duration_ms
        ))
    );
    print_warnings(&output.warnings);
}

fn print_document(doc: &DocumentOutput) {
    eprintln!("   {:<10} {}", dim("document"), doc.tex.display());
    match &doc.outcome {
        CompileOutcome::Compiled { backend, pdf } => eprintln!(
            "   {:<10} {}  {}",
            dim("pdf"),
            bold(&pdf.display().to_string()),
            dim(&format!("({backend})"))
        ),
        CompileOutcome::Skipped => {
            eprintln!("   {:<10} {}", dim("pdf"), dim("skipped"))
        }
    }
}

fn print_warnings(warnings: &[RowWarning]) {
    for w in warnings {
        eprintln!("   {} {}", yellow("⚠"), w);
    }
}

//! CLI binary for pdf2deck.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DeckConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2deck::{
    convert, inspect, DeckConfig, DeckProgressCallback, ProgressCallback, Stage,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one percentage bar for the whole run plus a
/// log line per rendered page and per stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl DeckProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let label = match stage {
            Stage::Loading => "Loading",
            Stage::Rendering => "Rendering",
            Stage::Analyzing => "Analyzing",
            Stage::Reconciling => "Reconciling",
            Stage::Assembling => "Assembling",
        };
        self.bar.set_prefix(label);
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("{label}…"))));
    }

    fn on_progress(&self, percent: f32, message: &str) {
        self.bar.set_position(percent.round() as u64);
        self.bar.set_message(message.to_string());
    }

    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}",
            green("✓"),
            page_num,
            total_pages
        ));
    }

    fn on_run_complete(&self, slide_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} slides ready",
            green("✔"),
            bold(&slide_count.to_string())
        );
    }

    fn on_run_failed(&self, stage: Stage, error: &str) {
        self.bar.abandon();
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        eprintln!("{} {} failed: {}", red("✘"), stage, red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrated deck next to the current directory
  pdf2deck lecture.pdf

  # Write into a directory, notes in Japanese
  pdf2deck lecture.pdf -o decks/ --language Japanese

  # Use a specific model
  pdf2deck --model gpt-4.1 --provider openai report.pdf

  # Convert from URL
  pdf2deck https://arxiv.org/pdf/1706.03762 -o decks/

  # Inspect PDF metadata (no API key needed)
  pdf2deck --inspect-only report.pdf

  # JSON summary with every slide title and script
  pdf2deck --json report.pdf > deck.json

OUTPUT:
  One .pptx per run, 16:9, one slide per PDF page. Each slide shows the page
  image scaled to fit; the generated script is in the presenter notes. The
  file is named after the generated presentation title.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to a libpdfium shared library
  RUST_LOG                Log filter, e.g. pdf2deck=debug
"#;

/// Turn PDF documents into narrated slide decks.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2deck",
    version,
    about = "Turn PDF documents into narrated slide decks (.pptx with presenter notes)",
    long_about = "Render every page of a PDF, ask a vision LLM for a title and a speaker \
script per page, and write a 16:9 PowerPoint deck with the page images as slides and the \
scripts as presenter notes. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and \
any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory to write the .pptx into.
    #[arg(short, long, env = "PDF2DECK_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Render scale relative to PDF points (0.5–4.0).
    #[arg(long, env = "PDF2DECK_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Longest edge of a rendered page in pixels.
    #[arg(long, env = "PDF2DECK_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// JPEG quality for slide images (1–100).
    #[arg(long, env = "PDF2DECK_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Language for titles and presenter notes (e.g. English, Japanese).
    #[arg(long, env = "PDF2DECK_LANGUAGE")]
    language: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2DECK_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2DECK_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens for the whole document.
    #[arg(long, env = "PDF2DECK_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2DECK_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Maximum length of the generated file name (characters).
    #[arg(long, env = "PDF2DECK_NAME_MAX_LEN", default_value_t = 50)]
    name_max_len: usize,

    /// Print a JSON summary (path, titles, notes) to stdout.
    #[arg(long, env = "PDF2DECK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2DECK_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2DECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2DECK_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2DECK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds (0 disables).
    #[arg(long, env = "PDF2DECK_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless verbose output was asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn DeckProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, &cli.output_dir, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let summary = serde_json::json!({
            "path": output.path,
            "pageCount": output.page_count,
            "analysis": output.analysis,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} slides  →  {}",
            green("✔"),
            output.page_count,
            bold(&output.path.display().to_string()),
        );
        if !output.analysis.summary.is_empty() {
            eprintln!("   {}", dim(&output.analysis.summary));
        }
    }

    Ok(())
}

/// Map CLI args to `DeckConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DeckConfig> {
    let mut builder = DeckConfig::builder()
        .render_scale(cli.scale)
        .max_rendered_pixels(cli.max_pixels)
        .jpeg_quality(cli.jpeg_quality)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .file_name_max_len(cli.name_max_len)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref language) = cli.language {
        builder = builder.language(language.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

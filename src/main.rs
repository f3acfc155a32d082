//! docpress - render structured markdown/code documents to bookmarked PDF

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use docpress::{
    ConfigFile, DocPress, DocPressBuilder, Document, OutlinePlan, RenderOutcome, RenderPath,
    RendererBackend, inspect_pdf_path, require_readable_outline, unique_download_filenames,
};

#[derive(Parser)]
#[command(name = "docpress")]
#[command(version, about = "Render JSON documents to PDF with a bookmark outline", long_about = None)]
#[command(after_help = "EXAMPLES:
    docpress render report.json -o report.pdf      Render one document
    docpress render a.json b.json --out-dir out    Render several in parallel
    docpress outline report.json                   Show the planned bookmarks
    docpress inspect report.pdf                    Show page count and outline")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render JSON documents to PDF
    Render(RenderArgs),
    /// Print the bookmark tree a document would get, without rendering
    Outline {
        #[arg(value_name = "INPUT.json")]
        input: PathBuf,
    },
    /// Print version, page count and outline of a PDF
    Inspect {
        #[arg(value_name = "FILE.pdf")]
        input: PathBuf,
    },
    /// Render the built-in test document to debug_test.pdf
    Selftest {
        #[command(flatten)]
        engine: EngineArgs,

        #[arg(short, long, default_value = "debug_test.pdf")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Input documents (JSON)
    #[arg(value_name = "INPUT.json", required = true)]
    inputs: Vec<PathBuf>,

    /// Output file; only valid with a single input
    #[arg(short, long, conflicts_with = "out_dir")]
    output: Option<PathBuf>,

    /// Directory for outputs named after each document title
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    #[command(flatten)]
    engine: EngineArgs,

    /// Skip the bookmark outline
    #[arg(long)]
    no_bookmarks: bool,

    /// Also save the composed HTML (into DIR, default: the output directory)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    keep_html: Option<Option<PathBuf>>,
}

#[derive(Args)]
struct EngineArgs {
    /// YAML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Render engine
    #[arg(long, value_enum)]
    backend: Option<RendererBackend>,

    /// Path to the engine binary
    #[arg(long, value_name = "PATH")]
    binary: Option<PathBuf>,

    /// Engine timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

impl EngineArgs {
    fn builder(&self) -> Result<DocPressBuilder, String> {
        let mut builder = DocPress::builder();
        if let Some(path) = &self.config {
            let config = ConfigFile::load(path).map_err(|e| format!("{}: {e}", path.display()))?;
            builder = config.apply(builder);
        }
        if let Some(backend) = self.backend {
            builder = builder.backend(backend);
        }
        if let Some(binary) = &self.binary {
            builder = builder.renderer_binary(binary);
        }
        if let Some(secs) = self.timeout {
            builder = builder.render_timeout(Duration::from_secs(secs));
        }
        Ok(builder)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Render(args) => render(args),
        Commands::Outline { input } => outline(input),
        Commands::Inspect { input } => inspect(input),
        Commands::Selftest { engine, output } => selftest(engine, output),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "info".to_string(),
            _ => "debug".to_string(),
        },
    };
    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn load_document(path: &Path) -> Result<Document, String> {
    Document::from_json_file(path).map_err(|e| format!("{}: {e}", path.display()))
}

fn render(args: &RenderArgs) -> Result<(), String> {
    if args.output.is_some() && args.inputs.len() > 1 {
        return Err("--output takes a single input; use --out-dir for several".to_string());
    }
    let documents = args
        .inputs
        .iter()
        .map(|path| load_document(path))
        .collect::<Result<Vec<_>, _>>()?;

    let out_dir = args.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let targets: Vec<PathBuf> = match &args.output {
        Some(output) => vec![output.clone()],
        None => unique_download_filenames(&documents)
            .into_iter()
            .map(|name| out_dir.join(name))
            .collect(),
    };

    let mut builder = args.engine.builder()?.bookmarks(!args.no_bookmarks);
    if let Some(dir) = &args.keep_html {
        let dir = dir.clone().unwrap_or_else(|| {
            targets
                .first()
                .and_then(|t| t.parent())
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        builder = builder.keep_html(dir);
    }
    let press = builder.build().map_err(|e| e.to_string())?;

    if args.output.is_none() {
        std::fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;
    }
    let outcomes = press.render_many(&documents);
    for (outcome, target) in outcomes.iter().zip(&targets) {
        write_outcome(outcome, target)?;
    }
    Ok(())
}

fn write_outcome(outcome: &RenderOutcome, target: &Path) -> Result<(), String> {
    std::fs::write(target, &outcome.bytes).map_err(|e| format!("{}: {e}", target.display()))?;
    if outcome.path != RenderPath::Full {
        eprintln!(
            "warning: {} holds the {} fallback; the cause is logged above",
            target.display(),
            outcome.path.as_str()
        );
    }
    println!(
        "{} ({} bytes, sha256 {})",
        target.display(),
        outcome.bytes.len(),
        outcome.sha256
    );
    Ok(())
}

fn outline(input: &Path) -> Result<(), String> {
    let document = load_document(input)?;
    let plan = OutlinePlan::from_document(&document);
    if plan.is_empty() {
        println!("(no bookmarks)");
    } else {
        print!("{}", plan.render_tree());
    }
    Ok(())
}

fn inspect(input: &Path) -> Result<(), String> {
    let report = inspect_pdf_path(input).map_err(|e| format!("{}: {e}", input.display()))?;
    println!("File: {}", input.display());
    println!("PDF version: {}", report.pdf_version);
    println!("Pages: {}", report.page_count);
    println!("Size: {} bytes", report.file_size_bytes);
    println!("Encrypted: {}", if report.encrypted { "yes" } else { "no" });
    if let Err(e) = require_readable_outline(&report) {
        println!("Outline: not read ({e})");
    } else if report.outline.is_empty() {
        println!("Outline: (none)");
    } else {
        println!("Outline:");
        for line in report.outline_tree().lines() {
            println!("  {line}");
        }
    }
    Ok(())
}

fn selftest(engine: &EngineArgs, output: &Path) -> Result<(), String> {
    let press = engine.builder()?.build().map_err(|e| e.to_string())?;
    let outcome = press.render(&Document::selftest());
    write_outcome(&outcome, output)
}

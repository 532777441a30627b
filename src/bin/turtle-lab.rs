use std::{
    io::Read as _,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use turtle_lab::{
    BlobRegistry, DragEvent, DroppedFile, Lab, LabConfig, ProcessSandbox, inspect_drag,
};

#[derive(Parser, Debug)]
#[command(name = "turtle-lab", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run turtle code through a sandbox and save the baked PNG.
    Render(RenderArgs),
    /// Print the source embedded in a baked PNG.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false, id = "input")]
struct RenderInput {
    /// Turtle source file (`-` for stdin).
    #[arg(long)]
    source: Option<PathBuf>,

    /// Previously baked PNG to re-render from its embedded source.
    #[arg(long = "from-png")]
    from_png: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: RenderInput,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Sandbox program speaking the line-delimited JSON protocol.
    #[arg(long)]
    sandbox: String,

    /// Extra argument for the sandbox program (repeatable).
    #[arg(long = "sandbox-arg", allow_hyphen_values = true)]
    sandbox_args: Vec<String>,

    /// Lab configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Baked PNG.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Extract(args) => cmd_extract(args),
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read source from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("read source '{}'", path.display()))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => LabConfig::from_json_file(path)?,
        None => LabConfig::default(),
    };
    let sandbox = ProcessSandbox::new(&args.sandbox).args(&args.sandbox_args);

    let source = match (&args.input.source, &args.input.from_png) {
        // Authored files get the same trim as an embedded script; imported
        // sources are taken verbatim.
        (Some(path), _) => read_source(path)?.trim().to_owned(),
        (None, Some(png)) => {
            let event = DragEvent::drop_files(vec![DroppedFile::from_path(png)]);
            inspect_drag(&event).source.with_context(|| {
                format!("'{}' carries no embedded turtle source", png.display())
            })?
        }
        (None, None) => anyhow::bail!("either --source or --from-png is required"),
    };

    let mut lab = Lab::create(config, sandbox, BlobRegistry::new(), source, Instant::now())?;
    lab.run_until_idle()?;

    if lab.error().is_shown() {
        eprintln!("error: {}", lab.error().text());
    }
    let baked = lab
        .baked()
        .context("nothing was drawn; no image to save")?;
    baked.save_as(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read png '{}'", args.in_path.display()))?;
    let source = turtle_lab::extract_source(&bytes).with_context(|| {
        format!(
            "'{}' carries no embedded turtle source",
            args.in_path.display()
        )
    })?;
    print!("{source}");
    Ok(())
}

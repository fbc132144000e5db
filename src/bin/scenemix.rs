use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser, Debug)]
#[command(name = "scenemix", version)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a script and report how many commands it holds.
    Check(CheckArgs),
    /// Build the timeline (generating missing assets) and print the mix plan.
    Plan(PlanArgs),
    /// Build the timeline and render the mix (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
    /// Print the cache path an asset key maps to.
    Key(KeyArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Scene script.
    #[arg(long)]
    script: PathBuf,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Scene script.
    #[arg(long)]
    script: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Scene script.
    #[arg(long)]
    script: PathBuf,

    /// Output audio path.
    #[arg(long)]
    out: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct KeyArgs {
    #[arg(long, value_enum, default_value_t = NamespaceChoice::Voice)]
    namespace: NamespaceChoice,

    /// Asset file extension.
    #[arg(long, default_value = "opus")]
    ext: String,

    /// Phrase or sound description.
    text: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NamespaceChoice {
    Voice,
    Sound,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Render(args) => cmd_render(args),
        Command::Key(args) => cmd_key(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "scenemix=debug" } else { "scenemix=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_script(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read script '{}'", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<scenemix::SceneConfig> {
    match path {
        Some(p) => scenemix::SceneConfig::load(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(scenemix::SceneConfig::default()),
    }
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let text = read_script(&args.script)?;
    let lines = scenemix::parse_script(&text)
        .with_context(|| format!("parse script '{}'", args.script.display()))?;
    println!("{} commands", lines.len());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let text = read_script(&args.script)?;
    let cfg = load_config(args.config.as_deref())?;
    let sample_rate = cfg.render.sample_rate;
    let pipeline = scenemix::Pipeline::from_config(cfg)?;

    let plan = pipeline
        .compile_script(&text)
        .with_context(|| format!("compile script '{}'", args.script.display()))?;
    let json = serde_json::to_string_pretty(&plan).context("serialize mix plan")?;
    println!("{json}");
    println!("{}", plan.filter_graph(sample_rate));
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let text = read_script(&args.script)?;
    let cfg = load_config(args.config.as_deref())?;
    for tool in ["ffmpeg", "ffprobe"] {
        if !scenemix::is_tool_on_path(tool) {
            anyhow::bail!("'{tool}' not found on PATH");
        }
    }
    let pipeline = scenemix::Pipeline::from_config(cfg)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let plan = pipeline
        .render_script(&text, &args.out)
        .with_context(|| format!("render script '{}'", args.script.display()))?;

    eprintln!(
        "wrote {} ({} segments, {:.3}s)",
        args.out.display(),
        plan.inputs.len(),
        plan.total_duration_secs
    );
    Ok(())
}

fn cmd_key(args: KeyArgs) -> anyhow::Result<()> {
    let namespace = match args.namespace {
        NamespaceChoice::Voice => scenemix::Namespace::Voice,
        NamespaceChoice::Sound => scenemix::Namespace::Sound,
    };
    let key = scenemix::AssetKey::new(namespace, args.text);
    println!("{}", key.rel_path(&args.ext));
    Ok(())
}

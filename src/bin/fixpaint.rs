use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fixpaint::{IntRect, Presented, SceneDesc, Stage};

#[derive(Parser, Debug)]
#[command(name = "fixpaint", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene file to a PNG.
    Frame(FrameArgs),
    /// Render frame 0, apply the scene's updates and report the resulting damage as JSON.
    Damage(DamageArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Apply the scene's `updates` and render a second frame before writing.
    #[arg(long, default_value_t = false)]
    updates: bool,

    /// Override the scene's damage tracking switch.
    #[arg(long)]
    dirty_rects: Option<bool>,

    /// Tint each dirty rectangle of the written frame.
    #[arg(long, default_value_t = false)]
    debug_overlay: bool,
}

#[derive(Parser, Debug)]
struct DamageArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Also write the partially redrawn frame to this PNG.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pretty-print the report.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Debug, serde::Serialize)]
struct DamageReport {
    width: u32,
    height: u32,
    updates: usize,
    overflowed: bool,
    presented: Presented,
    dirty_area: i64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Damage(args) => cmd_damage(args),
    }
}

fn load_scene(path: &std::path::Path) -> anyhow::Result<SceneDesc> {
    let mut desc = SceneDesc::from_path(path)
        .with_context(|| format!("load scene '{}'", path.display()))?;
    let opts = desc.opts().clone().with_env_overrides();
    desc.set_opts(opts);
    Ok(desc)
}

fn build_stage(desc: &SceneDesc) -> anyhow::Result<Stage> {
    desc.build().context("build scene")
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let desc = load_scene(&args.in_path)?;
    let mut stage = build_stage(&desc)?;
    if let Some(on) = args.dirty_rects {
        stage.set_dirty_rects_enabled(on);
    }
    stage.set_debug_overlay(args.debug_overlay);

    stage.frame();
    if args.updates {
        desc.apply_updates(&mut stage).context("apply scene updates")?;
        let presented = stage.frame();
        tracing::info!(?presented, "rendered updated frame");
    }

    stage
        .surface()
        .save_png(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_damage(args: DamageArgs) -> anyhow::Result<()> {
    let desc = load_scene(&args.in_path)?;
    let mut stage = build_stage(&desc)?;

    stage.frame();
    desc.apply_updates(&mut stage).context("apply scene updates")?;
    stage.tick();
    let overflowed = stage.is_overflowed();
    let presented = stage.render();
    let dirty_area = match &presented {
        Presented::Full => i64::from(desc.width()) * i64::from(desc.height()),
        Presented::Rects(rects) => rects.iter().map(IntRect::area).sum(),
    };

    let report = DamageReport {
        width: desc.width(),
        height: desc.height(),
        updates: desc.update_count(),
        overflowed,
        presented,
        dirty_area,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    if let Some(out) = &args.out {
        stage
            .surface()
            .save_png(out)
            .with_context(|| format!("write png '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

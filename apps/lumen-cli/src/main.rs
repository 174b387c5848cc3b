use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lumen_render::headless::{HeadlessDevice, HeadlessWindow, ResourceKind, Trace, TraceEvent};
use lumen_render::{
    BuiltinEffect, CompiledShader, FlyCamera, Renderer, RendererConfig, SceneOptions, ShaderAsset,
    build_scene,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen-cli", about = "CLI tool for lumen effects and headless frames")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, crate info and the built-in effects
    Info,
    /// Render frames on the headless backend and print the resource trace
    Trace {
        /// Number of frames to render
        #[arg(short, long, default_value = "2")]
        frames: u32,
        #[arg(long, default_value = "800")]
        width: u32,
        #[arg(long, default_value = "600")]
        height: u32,
        /// Advance the sampler filter before every frame
        #[arg(long)]
        cycle: bool,
        /// Wavefront OBJ model to load instead of the cube
        #[arg(long)]
        mesh: Option<PathBuf>,
        /// Make creation of this resource kind fail (e.g. `swap-chain`)
        #[arg(long)]
        fail_on: Option<ResourceKind>,
        /// Print every command, not just resource lifetimes
        #[arg(long)]
        commands: bool,
    },
    /// Compile an effect and print its reflection
    Inspect {
        /// Effect manifest path, or the name of a built-in effect
        effect: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("lumen-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", lumen_render::crate_info());
            println!("assets: {}", lumen_assets::crate_info());
            let names: Vec<_> = BuiltinEffect::ALL.iter().map(|e| e.name()).collect();
            println!("built-in effects: {}", names.join(", "));
        }
        Commands::Trace {
            frames,
            width,
            height,
            cycle,
            mesh,
            fail_on,
            commands,
        } => {
            let mut window = HeadlessWindow::new(width, height);
            if let Some(kind) = fail_on {
                window = window.failing_on(kind);
            }
            trace_frames(&window, frames, cycle, mesh, commands)?;
        }
        Commands::Inspect { effect } => {
            let asset = match effect.parse::<BuiltinEffect>() {
                Ok(builtin) => builtin.asset()?,
                Err(_) => ShaderAsset::from_file(&effect)?,
            };
            let shader = CompiledShader::compile(&asset)?;
            print_shader(&shader);
        }
    }

    Ok(())
}

/// Run the frames, then print the trace even when building the scene failed.
fn trace_frames(
    window: &HeadlessWindow,
    frames: u32,
    cycle: bool,
    mesh: Option<PathBuf>,
    commands: bool,
) -> anyhow::Result<()> {
    let result = run_frames(window, frames, cycle, mesh);
    print_trace(window.trace(), commands);
    result
}

fn run_frames(
    window: &HeadlessWindow,
    frames: u32,
    cycle: bool,
    mesh: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut renderer: Renderer<HeadlessDevice, FlyCamera> =
        Renderer::new(window, FlyCamera::default(), RendererConfig::default());
    if let Some(err) = renderer.init_error() {
        println!("initialization failed at the {}: {}", err.step, err.source);
        return Ok(());
    }

    let options = SceneOptions {
        mesh,
        ..SceneOptions::default()
    };
    let count = build_scene(&mut renderer, &options).context("building the scene")?;
    println!("scene: {count} meshes");

    for frame in 0..frames {
        if cycle {
            let filter = renderer.cycle_filter_mode();
            println!("frame {frame}: filter {filter}");
        }
        renderer.update(1.0 / 60.0);
        renderer.render();
    }
    Ok(())
}

fn print_trace(trace: &Trace, commands: bool) {
    for event in trace.events() {
        if commands || !matches!(event, TraceEvent::Command(_)) {
            println!("{event}");
        }
    }

    println!();
    println!("{:<22} {:>8} {:>8}", "resource", "created", "released");
    let created = trace.created();
    let released = trace.released();
    for kind in ResourceKind::ALL {
        let made = created.iter().filter(|(_, k)| *k == kind).count();
        if made == 0 {
            continue;
        }
        let freed = released.iter().filter(|(_, k)| *k == kind).count();
        println!("{:<22} {made:>8} {freed:>8}", kind.to_string());
    }
    println!("live after teardown: {}", trace.live_total());
}

fn print_shader(shader: &CompiledShader) {
    println!("effect: {}", shader.name());
    let slots: Vec<_> = shader.slots().iter().map(|s| s.to_string()).collect();
    println!("slots: [{}]", slots.join(", "));

    println!("variables:");
    for var in shader.variables() {
        println!("  @binding({}) {} : {:?}", var.binding, var.name, var.kind);
    }

    println!("techniques:");
    for technique in shader.techniques() {
        let marker = if technique.is_translucent() { " (translucent)" } else { "" };
        println!("  {}{marker}", technique.name);
        for pass in &technique.passes {
            println!(
                "    pass `{}`: {} / {}, blend {:?}, depth write {}, cull {:?}",
                pass.name,
                pass.vertex_entry,
                pass.fragment_entry,
                pass.state.blend,
                pass.state.depth_write,
                pass.state.cull
            );
            for input in &pass.inputs {
                println!("      @location({}) {:?}", input.location, input.format);
            }
        }
    }
}

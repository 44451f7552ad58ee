//! Lumen Viewer
//!
//! Opens a window and clears it every frame, exercising device selection,
//! swapchain rebuilds and the frame loop end to end.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p lumen-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--no-vsync`: Prefer mailbox/immediate presentation
//! - `--validation`: Enable Vulkan validation layers
//! - `--frames-in-flight <N>`: Frames recorded ahead of the GPU (default: 2)
//! - `--fps <N>`: Cap the frame rate
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use lumen_app::{run_app, AppConfig, AppContext, FrameContext, LumenApp};
use tracing::{debug, info};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.08, 1.0];
const REPORT_INTERVAL: u64 = 600;

struct Viewer;

impl LumenApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let extent = ctx.extent();
        info!("Viewer ready at {}x{}", extent.width, extent.height);
        Ok(Viewer)
    }

    fn render(&mut self, _ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()> {
        // The render pass clears the image; nothing else to draw.
        if frame.frame_number % REPORT_INTERVAL == 0 {
            debug!(
                "Frame {} (image {}, slot {}, {:.2} ms)",
                frame.frame_number,
                frame.image_index,
                frame.slot_index,
                frame.dt * 1000.0
            );
        }
        Ok(())
    }

    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        debug!("Aspect ratio {:.3} at {width}x{height}", ctx.aspect_ratio());
        Ok(())
    }
}

/// Command line options.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(AppOptions),
    Help,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct AppOptions {
    no_vsync: bool,
    validation: bool,
    frames_in_flight: Option<usize>,
    fps: Option<u32>,
}

impl AppOptions {
    fn config(&self) -> AppConfig {
        let mut config = AppConfig::new("Lumen Viewer")
            .with_size(WIDTH, HEIGHT)
            .with_vsync(!self.no_vsync)
            .with_clear_color(CLEAR_COLOR);
        if self.validation {
            config = config.with_validation(true);
        }
        if let Some(count) = self.frames_in_flight {
            config = config.with_frames_in_flight(count);
        }
        if let Some(fps) = self.fps {
            config = config.with_target_fps(fps);
        }
        config
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut options = AppOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--no-vsync" => options.no_vsync = true,
            "--validation" => options.validation = true,
            "--frames-in-flight" => {
                let value = args.next().ok_or("--frames-in-flight needs a value")?;
                let count = value
                    .parse::<usize>()
                    .map_err(|e| format!("invalid frame count '{value}': {e}"))?;
                if count == 0 {
                    return Err("--frames-in-flight must be at least 1".to_string());
                }
                options.frames_in_flight = Some(count);
            }
            "--fps" => {
                let value = args.next().ok_or("--fps needs a value")?;
                let fps = value
                    .parse::<u32>()
                    .map_err(|e| format!("invalid fps '{value}': {e}"))?;
                options.fps = Some(fps);
            }
            other => return Err(format!("unknown option '{other}'")),
        }
    }

    Ok(Command::Run(options))
}

fn main() -> anyhow::Result<()> {
    match parse_args(std::env::args().skip(1)) {
        Ok(Command::Help) => {
            print_help();
            Ok(())
        }
        Ok(Command::Run(options)) => run_app::<Viewer>(options.config()),
        Err(e) => {
            eprintln!("error: {e}\n");
            print_help();
            std::process::exit(2);
        }
    }
}

fn print_help() {
    eprintln!(
        "Lumen Viewer

USAGE:
    lumen-viewer [OPTIONS]

OPTIONS:
    --no-vsync                Prefer mailbox/immediate presentation
    --validation              Enable Vulkan validation layers
    --frames-in-flight <N>    Frames recorded ahead of the GPU (default: 2)
    --fps <N>                 Cap the frame rate
    -h, --help                Print this help message"
    );
}

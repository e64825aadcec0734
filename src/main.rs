use dxframe_rs::prelude::*;
use dxframe_rs::logging;

use os::{AppInfo, PumpStatus};

/// A headless run has no window to close, so it exits after a fixed number of frames.
#[cfg(not(target_os = "windows"))]
fn finished(frame_count: u64) -> bool {
    frame_count >= 120
}

#[cfg(target_os = "windows")]
fn finished(_frame_count: u64) -> bool {
    false
}

fn run<D: gfx::Device, A: App>(config: RenderConfig) -> Result<()> {
    let mut app = A::create(AppInfo {
        name: String::from("dxframe"),
        dpi_aware: true,
    })?;

    let mut ctx: Context<D, A> = Context::create(&mut app, config)?;

    loop {
        match app.pump(&mut ctx) {
            Ok(PumpStatus::Quit) => break,
            Ok(PumpStatus::Dispatched) => (),
            Ok(PumpStatus::Idle) => {
                ctx.update()?;
                ctx.render()?;
                if finished(ctx.frame().frame_count()) {
                    break;
                }
            }
            Err(err) => {
                // gpu state is no longer consistent, stop rendering
                tracing::error!("event dispatch failed: {}", err);
                let _ = ctx.shutdown();
                return Err(err);
            }
        }
    }

    ctx.shutdown()
}

fn main() -> Result<()> {
    logging::init_logging();

    let config = RenderConfig::load_or_default("config.user.json")?;

    if cfg!(not(target_os = "windows")) {
        tracing::warn!("no native backend for this platform, running headless");
    }

    run::<gfx_platform::Device, os_platform::App>(config)
}

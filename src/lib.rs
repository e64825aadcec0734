/// Operating system module.
pub mod os;

/// Graphics api abstraction and backends.
pub mod gfx;

/// Fence synchronisation between the cpu and the gpu timeline.
pub mod sync;

/// Render target, depth stencil and shader visible descriptor heaps.
pub mod heaps;

/// Device, queue, command allocator and command list creation.
pub mod bootstrap;

/// Swap chain, back buffer and depth buffer lifecycle.
pub mod swap_chain;

/// Per-frame record, submit, present and wait sequence.
pub mod frame;

/// Cube geometry, constants and orbit camera.
pub mod scene;

/// Owned application context which drives the frame loop from window events.
pub mod context;

/// Serialisable render configuration.
pub mod config;

/// Frame timing.
pub mod clock;

/// Tracing subscriber setup.
pub mod logging;

/// Use bitmask for flags
#[macro_use]
extern crate bitflags;

use thiserror::Error;

/// Errors for all modules, grouped by how they should be handled. Setup failures arrive as
/// `Device`, anything raised while the frame loop is running is considered fatal.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to create a device, queue, fence, heap or swap chain
    #[error("device creation failed: {0}")]
    Device(String),

    /// A gpu call failed during steady state rendering (includes device removal)
    #[error("gpu error: {0}")]
    Gpu(String),

    /// Fence signalling or completion event registration failed
    #[error("synchronisation failed: {0}")]
    Sync(String),

    /// Command list or resource state misuse reported by a backend
    #[error("validation error: {0}")]
    Validation(String),

    /// The engine was driven out of order (ie. render while a frame is in flight)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration values
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using the crate's `Error`.
pub type Result<T> = std::result::Result<T, Error>;

// conversion for windows-rs win32 errors
#[cfg(target_os = "windows")]
impl From<windows::core::Error> for Error {
    fn from(err: windows::core::Error) -> Error {
        Error::Gpu(format!("{} ({:?})", err.message(), err.code()))
    }
}

/// Setup failures are always reported as `Error::Device`, whichever backend call raised them.
pub(crate) fn setup_err(what: &'static str) -> impl Fn(Error) -> Error {
    move |err| match err {
        Error::Device(msg) => Error::Device(format!("{}: {}", what, msg)),
        other => Error::Device(format!("{}: {}", what, other)),
    }
}

/// Returns the path to a data file relative to the crate root, so demos and tests
/// work regardless of the working directory they were launched from.
pub fn get_data_path(asset: &str) -> String {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    root.join(asset).to_string_lossy().to_string()
}

/// Common imports for binaries and tests.
pub mod prelude {
    pub use crate::{
        bootstrap::GpuCore,
        clock::HighResolutionClock,
        config::RenderConfig,
        context::Context,
        frame::{FrameLoop, FrameState},
        gfx,
        gfx::{Buffer, CmdAllocator, CmdBuf, Device, Event, Fence, Heap, SwapChain, Texture},
        heaps::DescriptorHeaps,
        os,
        os::{App, Window, WindowDelegate},
        scene::{OrbitCamera, SceneResources},
        swap_chain::SwapChainManager,
        sync::FenceSync,
        Error, Result,
    };

    #[cfg(target_os = "windows")]
    pub use crate::os::win32 as os_platform;
    #[cfg(target_os = "windows")]
    pub use crate::gfx::d3d12 as gfx_platform;

    #[cfg(not(target_os = "windows"))]
    pub use crate::os::null as os_platform;
    #[cfg(not(target_os = "windows"))]
    pub use crate::gfx::null as gfx_platform;
}

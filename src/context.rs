use crate::bootstrap::GpuCore;
use crate::clock::HighResolutionClock;
use crate::config::RenderConfig;
use crate::frame::FrameLoop;
use crate::gfx;
use crate::os::{self, MouseButtons, Rect, Window, WindowDelegate, WindowInfo};
use crate::scene::{self, OrbitCamera, SceneResources};
use crate::swap_chain::SwapChainManager;
use crate::{setup_err, Result};

/// The application context. Owns the window and every gpu object, and is handed to
/// `App::pump` as the window's delegate.
pub struct Context<D: gfx::Device, A: os::App> {
    // fields drop in declaration order, scene resources first and the device (inside gpu) last
    scene: SceneResources<D>,
    surfaces: SwapChainManager<D>,
    gpu: GpuCore<D>,
    window: A::Window,
    frame: FrameLoop,
    camera: OrbitCamera,
    clock: HighResolutionClock,
    config: RenderConfig,
    frames_since_report: u64,
    shut_down: bool,
}

impl<D: gfx::Device, A: os::App> Context<D, A> {
    /// Create a window and a device described by `config` and build all gpu resources.
    pub fn create(app: &mut A, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let device = D::create(&config.device_info()).map_err(setup_err("create device"))?;
        Self::build(app, device, config)
    }

    /// Same as `create` using an existing device.
    pub fn create_with_device(app: &mut A, device: D, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Self::build(app, device, config)
    }

    fn build(app: &mut A, device: D, config: RenderConfig) -> Result<Self> {
        let window = app.create_window(WindowInfo {
            title: config.title.clone(),
            rect: Rect {
                x: 0,
                y: 0,
                width: config.width,
                height: config.height,
            },
        })?;

        let mut gpu = GpuCore::from_device(device, config.buffer_count)?;
        let surfaces = SwapChainManager::initialize::<A>(&mut gpu, &window, &config)?;
        let scene = SceneResources::create(&gpu.device, &gpu.heaps, &config)?;

        window.show();
        tracing::info!("context ready: {}x{}", surfaces.size().0, surfaces.size().1);

        Ok(Context {
            scene,
            surfaces,
            gpu,
            window,
            frame: FrameLoop::new(config.clear_colour, config.present_interval),
            camera: OrbitCamera::new(config.fov_degrees),
            clock: HighResolutionClock::new(),
            config,
            frames_since_report: 0,
            shut_down: false,
        })
    }

    /// Wait for the gpu to finish all submitted work. Must be called before the context is
    /// dropped, gpu objects are then released in dependency order.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        let value = self.gpu.flush()?;
        tracing::info!("shutdown complete at fence value {}", value);
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn gpu(&self) -> &GpuCore<D> {
        &self.gpu
    }

    pub fn surfaces(&self) -> &SwapChainManager<D> {
        &self.surfaces
    }

    pub fn frame(&self) -> &FrameLoop {
        &self.frame
    }

    pub fn scene(&self) -> &SceneResources<D> {
        &self.scene
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn window(&self) -> &A::Window {
        &self.window
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn update_fps(&mut self) {
        self.clock.tick();
        self.frames_since_report += 1;
        let elapsed = self.clock.sigma().as_secs_f64();
        if elapsed > 1.0 {
            let fps = self.frames_since_report as f64 / elapsed;
            let title = format!("{} - {:.1} FPS", self.config.title, fps);
            self.window.set_title(&title);
            self.frames_since_report = 0;
            self.clock.reset();
        }
    }
}

impl<D: gfx::Device, A: os::App> WindowDelegate for Context<D, A> {
    fn resize(&mut self, width: i32, height: i32) -> Result<()> {
        self.surfaces.rebuild_buffers(&mut self.gpu, width, height)?;
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.update_fps();
        let size = self.window.get_size();
        if size.x <= 0 || size.y <= 0 {
            return Ok(());
        }
        let aspect = size.x as f32 / size.y as f32;
        let mvp = self.camera.mvp(scene::identity(), aspect);
        self.scene.update(&mvp)
    }

    fn render(&mut self) -> Result<()> {
        self.frame.render(&mut self.gpu, &mut self.surfaces, &self.scene)
    }

    fn mouse_moved(&mut self, x: i32, y: i32, buttons: MouseButtons) -> Result<()> {
        self.camera.mouse_moved(x, y, buttons);
        Ok(())
    }

    fn close(&mut self) -> bool {
        tracing::info!("window close requested");
        true
    }
}

impl<D: gfx::Device, A: os::App> Drop for Context<D, A> {
    fn drop(&mut self) {
        if !self.shut_down {
            tracing::warn!("context dropped without shutdown, flushing the gpu queue");
            if let Err(err) = self.shutdown() {
                tracing::error!("flush on drop failed: {}", err);
            }
        }
    }
}

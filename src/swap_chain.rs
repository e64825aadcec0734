use crate::bootstrap::GpuCore;
use crate::config::RenderConfig;
use crate::gfx::{
    self, CmdBuf, DepthStencilClear, Format, ResourceState, ScissorRect, SwapChain, TextureInfo,
    TextureUsage, TransitionBarrier, Viewport,
};
use crate::os::{self, Window};
use crate::{setup_err, Error, Result};

/// Owns the swap chain, references to its back buffers and the depth stencil texture, and
/// recreates them whenever the client area changes size.
pub struct SwapChainManager<D: gfx::Device> {
    depth_stencil: Option<D::Texture>,
    back_buffers: Vec<D::Texture>,
    swap_chain: D::SwapChain,
    buffer_count: u32,
    back_buffer_format: Format,
    depth_stencil_format: Format,
    current: u32,
    width: u32,
    height: u32,
    viewport: Viewport,
    scissor: ScissorRect,
}

impl<D: gfx::Device> SwapChainManager<D> {
    /// Create the swap chain for `window` on the device queue and build the back buffer and
    /// depth stencil resources at the window's client size.
    pub fn initialize<A: os::App>(
        gpu: &mut GpuCore<D>,
        window: &A::Window,
        config: &RenderConfig,
    ) -> Result<Self> {
        let size = window.get_size();
        let (width, height) = if size.x > 0 && size.y > 0 {
            (size.x, size.y)
        } else {
            (config.width, config.height)
        };

        let info = config.swap_chain_info(width as u32, height as u32);
        let swap_chain = gpu
            .device
            .create_swap_chain::<A>(&info, window)
            .map_err(setup_err("create swap chain"))?;

        let mut manager = SwapChainManager {
            depth_stencil: None,
            back_buffers: Vec::new(),
            swap_chain,
            buffer_count: config.buffer_count,
            back_buffer_format: config.back_buffer_format,
            depth_stencil_format: config.depth_stencil_format,
            current: 0,
            width: 0,
            height: 0,
            viewport: Viewport::default(),
            scissor: ScissorRect::default(),
        };
        manager.rebuild_buffers(gpu, width, height)?;
        Ok(manager)
    }

    /// Recreate back buffer views and the depth buffer at `width` x `height`. Sizes which are
    /// zero or negative (ie. a minimised window) leave everything untouched and return false.
    pub fn rebuild_buffers(
        &mut self,
        gpu: &mut GpuCore<D>,
        width: i32,
        height: i32,
    ) -> Result<bool> {
        if width <= 0 || height <= 0 {
            tracing::debug!("ignoring degenerate resize to {}x{}", width, height);
            return Ok(false);
        }
        let (width, height) = (width as u32, height as u32);

        // no gpu work may reference the buffers about to be released
        gpu.flush()?;
        gpu.begin_recording(None)?;

        self.back_buffers.clear();
        self.depth_stencil = None;
        self.swap_chain
            .resize_buffers(self.buffer_count, width, height, self.back_buffer_format)?;

        for i in 0..self.buffer_count {
            let buffer = self.swap_chain.get_buffer(i)?;
            gpu.device
                .create_render_target_view(&buffer, gpu.heaps.rtv_handle(i)?)?;
            self.back_buffers.push(buffer);
        }
        self.current = 0;

        let depth_stencil = gpu.device.create_texture(&TextureInfo {
            width: width as u64,
            height: height as u64,
            format: self.depth_stencil_format,
            usage: TextureUsage::DEPTH_STENCIL,
            initial_state: ResourceState::Common,
            depth_stencil_clear: Some(DepthStencilClear {
                depth: 1.0,
                stencil: 0,
            }),
        })?;
        gpu.device.create_depth_stencil_view(
            &depth_stencil,
            self.depth_stencil_format,
            gpu.heaps.dsv_handle(),
        )?;

        gpu.cmd.transition_barrier(&TransitionBarrier {
            texture: Some(&depth_stencil),
            buffer: None,
            state_before: ResourceState::Common,
            state_after: ResourceState::DepthWrite,
        });
        self.depth_stencil = Some(depth_stencil);

        gpu.submit()?;
        gpu.flush()?;

        self.width = width;
        self.height = height;
        self.viewport = Viewport::from_extent(width, height);
        self.scissor = ScissorRect::from_extent(width, height);

        tracing::info!(
            "swap chain rebuilt: {}x{} with {} buffers",
            width,
            height,
            self.buffer_count
        );
        Ok(true)
    }

    /// Present the current back buffer and advance to the next one.
    pub fn present(&mut self, sync_interval: u32) -> Result<()> {
        self.swap_chain.present(sync_interval)?;
        self.current = (self.current + 1) % self.buffer_count;
        Ok(())
    }

    pub fn current_buffer_index(&self) -> u32 {
        self.current
    }

    pub fn current_back_buffer(&self) -> Result<&D::Texture> {
        self.back_buffers
            .get(self.current as usize)
            .ok_or_else(|| Error::InvalidState(format!("no back buffer at index {}", self.current)))
    }

    pub fn back_buffers(&self) -> &[D::Texture] {
        &self.back_buffers
    }

    pub fn depth_stencil(&self) -> Option<&D::Texture> {
        self.depth_stencil.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scissor_rect(&self) -> ScissorRect {
        self.scissor
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    pub fn swap_chain(&self) -> &D::SwapChain {
        &self.swap_chain
    }
}

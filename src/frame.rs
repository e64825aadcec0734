use crate::bootstrap::GpuCore;
use crate::gfx::{self, ClearColour, ClearFlags, CmdBuf, ResourceState, Topology, TransitionBarrier};
use crate::scene::SceneResources;
use crate::swap_chain::SwapChainManager;
use crate::{Error, Result};

/// Where the frame loop is within a single frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameState {
    /// The previous frame's gpu work has completed, command memory may be reused
    Idle,
    /// The command list is open and being recorded
    Recording,
    /// The command list has been executed on the queue
    Submitted,
    /// The back buffer has been presented, a flush is needed before going idle
    Presented,
}

/// Drives the per frame record, submit, present and wait sequence. A frame which fails
/// part way leaves the loop in the state it failed in, and further frames are rejected.
pub struct FrameLoop {
    state: FrameState,
    clear_colour: ClearColour,
    present_interval: u32,
    frame_count: u64,
    halted: bool,
}

impl FrameLoop {
    pub fn new(clear_colour: ClearColour, present_interval: u32) -> Self {
        FrameLoop {
            state: FrameState::Idle,
            clear_colour,
            present_interval,
            frame_count: 0,
            halted: false,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of frames which completed the whole sequence.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// True once any frame step has failed. A halted loop accepts no further steps.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn expect_state(&self, expected: FrameState, action: &str) -> Result<()> {
        if self.halted {
            return Err(Error::InvalidState(format!(
                "{} rejected, the frame loop halted in {:?} after a failed frame",
                action, self.state
            )));
        }
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "{} requires the frame loop to be {:?} but it is {:?}",
                action, expected, self.state
            )));
        }
        Ok(())
    }

    fn halt_on_err<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.halted = true;
        }
        result
    }

    /// Run one full frame: Idle -> Recording -> Submitted -> Presented -> Idle.
    pub fn render<D: gfx::Device>(
        &mut self,
        gpu: &mut GpuCore<D>,
        surfaces: &mut SwapChainManager<D>,
        scene: &SceneResources<D>,
    ) -> Result<()> {
        self.expect_state(FrameState::Idle, "render")?;
        let result = self.run_frame(gpu, surfaces, scene);
        if let Err(err) = &result {
            tracing::error!("frame {} failed while {:?}: {}", self.frame_count, self.state, err);
        }
        result
    }

    fn run_frame<D: gfx::Device>(
        &mut self,
        gpu: &mut GpuCore<D>,
        surfaces: &mut SwapChainManager<D>,
        scene: &SceneResources<D>,
    ) -> Result<()> {
        self.begin(gpu, scene)?;
        self.record(gpu, surfaces, scene)?;
        self.submit(gpu)?;
        self.present(surfaces)?;
        self.finish(gpu)
    }

    /// Idle -> Recording. Resets the allocator, valid because the last frame ended with a flush.
    pub fn begin<D: gfx::Device>(
        &mut self,
        gpu: &mut GpuCore<D>,
        scene: &SceneResources<D>,
    ) -> Result<()> {
        self.expect_state(FrameState::Idle, "begin")?;
        let result = gpu.begin_recording(Some(scene.pipeline()));
        self.halt_on_err(result)?;
        self.state = FrameState::Recording;
        Ok(())
    }

    /// Record the draw of the scene into the current back buffer.
    pub fn record<D: gfx::Device>(
        &mut self,
        gpu: &mut GpuCore<D>,
        surfaces: &SwapChainManager<D>,
        scene: &SceneResources<D>,
    ) -> Result<()> {
        self.expect_state(FrameState::Recording, "record")?;
        let result = self.record_commands(gpu, surfaces, scene);
        self.halt_on_err(result)
    }

    fn record_commands<D: gfx::Device>(
        &self,
        gpu: &mut GpuCore<D>,
        surfaces: &SwapChainManager<D>,
        scene: &SceneResources<D>,
    ) -> Result<()> {
        let back_buffer = surfaces.current_back_buffer()?;
        let rtv = gpu.heaps.rtv_handle(surfaces.current_buffer_index())?;
        let dsv = gpu.heaps.dsv_handle();
        let cbv = gpu.heaps.cbv_gpu_handle()?;
        let cmd = &mut gpu.cmd;

        cmd.set_viewport(&surfaces.viewport());
        cmd.set_scissor_rect(&surfaces.scissor_rect());

        cmd.transition_barrier(&TransitionBarrier {
            texture: Some(back_buffer),
            buffer: None,
            state_before: ResourceState::Present,
            state_after: ResourceState::RenderTarget,
        });

        cmd.clear_render_target(rtv, self.clear_colour);
        cmd.clear_depth_stencil(dsv, ClearFlags::DEPTH | ClearFlags::STENCIL, 1.0, 0);
        cmd.set_render_targets(rtv, Some(dsv));

        cmd.set_heap(gpu.heaps.cbv_heap());
        cmd.set_render_pipeline(scene.pipeline());
        cmd.set_render_descriptor_table(0, cbv);

        cmd.set_vertex_buffer(scene.vertex_buffer(), 0);
        cmd.set_index_buffer(scene.index_buffer());
        cmd.set_topology(Topology::TriangleList);
        cmd.draw_indexed_instanced(scene.index_count(), 1, 0, 0, 0);

        cmd.transition_barrier(&TransitionBarrier {
            texture: Some(back_buffer),
            buffer: None,
            state_before: ResourceState::RenderTarget,
            state_after: ResourceState::Present,
        });
        Ok(())
    }

    /// Recording -> Submitted.
    pub fn submit<D: gfx::Device>(&mut self, gpu: &mut GpuCore<D>) -> Result<()> {
        self.expect_state(FrameState::Recording, "submit")?;
        let result = gpu.submit();
        self.halt_on_err(result)?;
        self.state = FrameState::Submitted;
        Ok(())
    }

    /// Submitted -> Presented, advancing the back buffer index.
    pub fn present<D: gfx::Device>(&mut self, surfaces: &mut SwapChainManager<D>) -> Result<()> {
        self.expect_state(FrameState::Submitted, "present")?;
        let result = surfaces.present(self.present_interval);
        self.halt_on_err(result)?;
        self.state = FrameState::Presented;
        Ok(())
    }

    /// Presented -> Idle, once the gpu has finished with this frame.
    pub fn finish<D: gfx::Device>(&mut self, gpu: &mut GpuCore<D>) -> Result<()> {
        self.expect_state(FrameState::Presented, "finish")?;
        let result = gpu.flush();
        let value = self.halt_on_err(result)?;
        self.state = FrameState::Idle;
        self.frame_count += 1;
        tracing::trace!("frame {} complete at fence value {}", self.frame_count, value);
        Ok(())
    }
}

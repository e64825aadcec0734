use crate::gfx::{self, CmdAllocator, CmdBuf, DeviceInfo};
use crate::heaps::DescriptorHeaps;
use crate::sync::FenceSync;
use crate::{setup_err, Result};

/// The device and the objects every other module records or synchronises through.
/// Fields drop in declaration order, so views and command memory go before the fence and
/// the device goes last.
pub struct GpuCore<D: gfx::Device> {
    pub heaps: DescriptorHeaps<D>,
    pub cmd: D::CmdBuf,
    pub allocator: D::CmdAllocator,
    pub sync: FenceSync<D>,
    pub device: D,
}

impl<D: gfx::Device> GpuCore<D> {
    pub fn create(info: &DeviceInfo, buffer_count: u32) -> Result<Self> {
        let device = D::create(info).map_err(setup_err("create device"))?;
        Self::from_device(device, buffer_count)
    }

    /// Create the queue objects on an existing device, the command list is left closed.
    pub fn from_device(device: D, buffer_count: u32) -> Result<Self> {
        tracing::info!("adapter: {}", device.get_adapter_info());

        let sync = FenceSync::create(&device)?;
        let allocator = device
            .create_cmd_allocator()
            .map_err(setup_err("create command allocator"))?;
        let mut cmd = device
            .create_cmd_buf(&allocator)
            .map_err(setup_err("create command list"))?;
        cmd.close().map_err(setup_err("close command list"))?;
        let heaps = DescriptorHeaps::create(&device, buffer_count)?;

        Ok(GpuCore {
            heaps,
            cmd,
            allocator,
            sync,
            device,
        })
    }

    /// Wait for all submitted gpu work to complete, returns the fence value waited on.
    pub fn flush(&mut self) -> Result<u64> {
        self.sync.signal_and_wait(&self.device)
    }

    /// Reset the allocator and command list, only valid after a `flush`.
    pub fn begin_recording(&mut self, pipeline: Option<&D::RenderPipeline>) -> Result<()> {
        self.allocator.reset()?;
        self.cmd.reset(&self.allocator, pipeline)
    }

    /// Close the command list and execute it on the queue.
    pub fn submit(&mut self) -> Result<()> {
        self.cmd.close()?;
        self.device.execute(&self.cmd)
    }
}

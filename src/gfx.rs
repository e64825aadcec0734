use crate::os;
use crate::Error;

use serde::{Deserialize, Serialize};
use std::any::Any;

/// Implemented using Direct3D12 and DXGI for windows.
#[cfg(target_os = "windows")]
pub mod d3d12;

/// Headless device which simulates an asynchronous gpu timeline, used for tests and
/// non-windows hosts.
pub mod null;

type Result<T> = std::result::Result<T, Error>;

/// Pixel formats for textures, views and vertex attributes.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    Unknown,
    RGBA8n,
    RGB32f,
    RGBA32f,
    R16u,
    D32f,
    D24nS8u,
}

impl Format {
    /// Returns true for formats usable as depth stencil targets.
    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D32f | Format::D24nS8u)
    }
}

/// The usage state of a gpu resource. Resources must be explicitly moved between states with
/// a `TransitionBarrier`, the `state_before` must always match the resource's actual state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Common,
    Present,
    RenderTarget,
    DepthWrite,
    DepthRead,
    GenericRead,
}

/// Descriptor heap types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HeapType {
    /// cpu only heap for render target views
    RenderTarget,
    /// cpu only heap for depth stencil views
    DepthStencil,
    /// shader visible heap for constant buffer, shader resource and unordered access views
    Shader,
}

impl HeapType {
    /// Only `Shader` heaps are visible to the gpu.
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, HeapType::Shader)
    }
}

/// Information to create a fixed capacity descriptor heap.
pub struct HeapInfo {
    pub heap_type: HeapType,
    pub num_descriptors: usize,
}

/// A cpu address of a descriptor inside a heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptorHandle {
    pub ptr: usize,
}

/// A gpu address of a descriptor inside a shader visible heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptorHandle {
    pub ptr: u64,
}

/// Computes `base + index * increment_size`, the only way to address the nth descriptor in a heap.
pub fn descriptor_handle_at(
    base: CpuDescriptorHandle,
    index: usize,
    increment_size: usize,
) -> CpuDescriptorHandle {
    CpuDescriptorHandle {
        ptr: base.ptr + index * increment_size,
    }
}

/// Gpu equivalent of `descriptor_handle_at`.
pub fn gpu_descriptor_handle_at(
    base: GpuDescriptorHandle,
    index: usize,
    increment_size: usize,
) -> GpuDescriptorHandle {
    GpuDescriptorHandle {
        ptr: base.ptr + (index * increment_size) as u64,
    }
}

/// Structure to specify viewport coordinates on a `CmdBuf`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport at the origin covering `width` x `height` with depth range [0, 1].
    pub fn from_extent(width: u32, height: u32) -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Structure to specify scissor rect coordinates on a `CmdBuf`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScissorRect {
    pub fn from_extent(width: u32, height: u32) -> ScissorRect {
        ScissorRect {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        }
    }
}

/// Colour used to clear render targets.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct ClearColour {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColour {
    pub fn as_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

bitflags! {
    /// Selects which planes of a depth stencil view to clear.
    pub struct ClearFlags: u8 {
        const DEPTH = 0b00000001;
        const STENCIL = 0b00000010;
    }
}

bitflags! {
    /// How a texture may be bound to the pipeline.
    pub struct TextureUsage: u8 {
        const NONE = 0b00000000;
        const RENDER_TARGET = 0b00000001;
        const DEPTH_STENCIL = 0b00000010;
    }
}

/// Optimised clear value for a depth stencil texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DepthStencilClear {
    pub depth: f32,
    pub stencil: u8,
}

/// Information to create a device.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Optional name of an adapter to select, `None` uses the default adapter
    pub adapter_name: Option<String>,
    /// Skip hardware adapters and create a software rasteriser device
    pub use_software_adapter: bool,
    /// Enable api validation; this must never be enabled in release builds
    pub debug_layer: bool,
}

/// Information about the adapter a device was created on.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub description: String,
    pub software: bool,
}

impl std::fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let software = if self.software { " [software]" } else { "" };
        write!(f, "{} ({}){}", self.name, self.description, software)
    }
}

/// Information to create a swap chain bound to a window and the device queue.
#[derive(Debug, Copy, Clone)]
pub struct SwapChainInfo {
    pub num_buffers: u32,
    pub format: Format,
    pub width: u32,
    pub height: u32,
}

/// Information to create a 2D texture.
#[derive(Debug, Copy, Clone)]
pub struct TextureInfo {
    pub width: u64,
    pub height: u64,
    pub format: Format,
    pub usage: TextureUsage,
    pub initial_state: ResourceState,
    pub depth_stencil_clear: Option<DepthStencilClear>,
}

/// Buffer usage determines the view created for a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    ConstantBuffer,
}

/// Information to create a cpu writable upload buffer.
#[derive(Debug, Copy, Clone)]
pub struct BufferInfo {
    pub usage: BufferUsage,
    /// index format for `BufferUsage::Index`, `Format::Unknown` otherwise
    pub format: Format,
    pub stride: usize,
    pub num_elements: usize,
    pub initial_state: ResourceState,
}

impl BufferInfo {
    /// Size of the buffer in bytes; constant buffers are padded to 256 byte alignment.
    pub fn size_bytes(&self) -> usize {
        let size = self.stride * self.num_elements;
        match self.usage {
            BufferUsage::ConstantBuffer => align_pow2(size, 256),
            _ => size,
        }
    }
}

/// Round `value` up to the next multiple of `align`, which must be a power of 2.
pub fn align_pow2(value: usize, align: usize) -> usize {
    (value + (align - 1)) & !(align - 1)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderType {
    Vertex,
    Fragment,
}

/// Compile parameters for shaders supplied as source code.
#[derive(Debug, Clone)]
pub struct ShaderCompileInfo {
    pub entry_point: String,
    pub target: String,
    /// compile with debug info and optimisation disabled
    pub debug: bool,
}

/// Information to create a shader, data passed to `create_shader` is source when
/// `compile_info` is supplied or precompiled byte code otherwise.
#[derive(Debug, Clone)]
pub struct ShaderInfo {
    pub shader_type: ShaderType,
    pub compile_info: Option<ShaderCompileInfo>,
}

/// Describes a single per vertex attribute.
#[derive(Debug, Clone)]
pub struct InputElementInfo {
    pub semantic: String,
    pub index: u32,
    pub format: Format,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
}

/// Information to create a render pipeline. The root signature has a single descriptor table
/// at slot 0 containing `num_constant_buffers` constant buffer views starting at register b0.
pub struct RenderPipelineInfo<'a, D: Device> {
    pub vs: Option<&'a D::Shader>,
    pub fs: Option<&'a D::Shader>,
    pub input_layout: Vec<InputElementInfo>,
    pub num_constant_buffers: u32,
    pub topology: Topology,
    pub render_target_format: Format,
    pub depth_stencil_format: Format,
    pub depth_test: bool,
}

/// Explicit resource state transition, exactly one of `texture` or `buffer` must be set.
pub struct TransitionBarrier<'a, D: Device> {
    pub texture: Option<&'a D::Texture>,
    pub buffer: Option<&'a D::Buffer>,
    pub state_before: ResourceState,
    pub state_after: ResourceState,
}

/// A graphics device which owns the single direct command queue. All other gpu objects are
/// created through it and are invalid once it is dropped.
pub trait Device: 'static + Sized + Any {
    type SwapChain: SwapChain<Self>;
    type CmdAllocator: CmdAllocator<Self>;
    type CmdBuf: CmdBuf<Self>;
    type Fence: Fence<Self>;
    type Event: Event<Self>;
    type Heap: Heap<Self>;
    type Texture: Texture<Self>;
    type Buffer: Buffer<Self>;
    type Shader: Shader<Self>;
    type RenderPipeline: RenderPipeline<Self>;

    /// Create a device and its direct command queue
    fn create(info: &DeviceInfo) -> Result<Self>;
    fn get_adapter_info(&self) -> &AdapterInfo;
    /// Create a flip model swap chain for `window` on the device queue
    fn create_swap_chain<A: os::App>(
        &self,
        info: &SwapChainInfo,
        window: &A::Window,
    ) -> Result<Self::SwapChain>;
    fn create_cmd_allocator(&self) -> Result<Self::CmdAllocator>;
    /// Create a command list backed by `allocator`, the list is returned in the recording state
    fn create_cmd_buf(&self, allocator: &Self::CmdAllocator) -> Result<Self::CmdBuf>;
    fn create_fence(&self, initial_value: u64) -> Result<Self::Fence>;
    /// Create an auto reset event which a fence can signal on completion
    fn create_event(&self) -> Result<Self::Event>;
    fn create_heap(&self, info: &HeapInfo) -> Result<Self::Heap>;
    fn get_descriptor_increment_size(&self, heap_type: HeapType) -> usize;
    fn create_texture(&self, info: &TextureInfo) -> Result<Self::Texture>;
    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Self::Buffer>;
    fn create_shader(&self, info: &ShaderInfo, src: &[u8]) -> Result<Self::Shader>;
    fn create_render_pipeline(
        &self,
        info: &RenderPipelineInfo<Self>,
    ) -> Result<Self::RenderPipeline>;
    fn create_render_target_view(
        &self,
        texture: &Self::Texture,
        handle: CpuDescriptorHandle,
    ) -> Result<()>;
    fn create_depth_stencil_view(
        &self,
        texture: &Self::Texture,
        format: Format,
        handle: CpuDescriptorHandle,
    ) -> Result<()>;
    fn create_constant_buffer_view(
        &self,
        buffer: &Self::Buffer,
        handle: CpuDescriptorHandle,
    ) -> Result<()>;
    /// Submit a closed command list to the queue
    fn execute(&self, cmd: &Self::CmdBuf) -> Result<()>;
    /// Enqueue a signal which sets `fence` to `value` once all prior queue work has completed
    fn signal(&self, fence: &Self::Fence, value: u64) -> Result<()>;
}

/// A ring of presentable back buffers.
pub trait SwapChain<D: Device>: 'static + Sized + Any {
    fn get_num_buffers(&self) -> u32;
    fn get_size(&self) -> (u32, u32);
    /// Returns a new reference to back buffer `index`, references must be released before
    /// `resize_buffers`
    fn get_buffer(&self, index: u32) -> Result<D::Texture>;
    /// Resize the back buffers, all references to them must have been released and the gpu idle
    fn resize_buffers(
        &mut self,
        num_buffers: u32,
        width: u32,
        height: u32,
        format: Format,
    ) -> Result<()>;
    /// Present the current back buffer, `sync_interval` 0 presents immediately
    fn present(&mut self, sync_interval: u32) -> Result<()>;
}

/// Backing memory for command lists.
pub trait CmdAllocator<D: Device>: 'static + Sized + Any {
    /// Reclaim memory, only valid once all lists recorded from it have completed on the gpu
    fn reset(&mut self) -> Result<()>;
}

/// A command list. Lists must be closed before submission and before being reset again.
pub trait CmdBuf<D: Device>: 'static + Sized + Any {
    /// Reset a closed list to begin recording with an optional initial pipeline
    fn reset(
        &mut self,
        allocator: &D::CmdAllocator,
        pipeline: Option<&D::RenderPipeline>,
    ) -> Result<()>;
    /// Finish recording, errors from invalid recorded commands are reported here
    fn close(&mut self) -> Result<()>;
    fn is_closed(&self) -> bool;
    fn transition_barrier(&mut self, barrier: &TransitionBarrier<D>);
    fn set_viewport(&mut self, viewport: &Viewport);
    fn set_scissor_rect(&mut self, scissor_rect: &ScissorRect);
    fn clear_render_target(&mut self, rtv: CpuDescriptorHandle, colour: ClearColour);
    fn clear_depth_stencil(
        &mut self,
        dsv: CpuDescriptorHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    );
    fn set_render_targets(&mut self, rtv: CpuDescriptorHandle, dsv: Option<CpuDescriptorHandle>);
    fn set_heap(&mut self, heap: &D::Heap);
    fn set_render_pipeline(&mut self, pipeline: &D::RenderPipeline);
    fn set_render_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle);
    fn set_vertex_buffer(&mut self, buffer: &D::Buffer, slot: u32);
    fn set_index_buffer(&mut self, buffer: &D::Buffer);
    fn set_topology(&mut self, topology: Topology);
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );
}

/// A monotonic 64 bit counter signalled by the queue.
pub trait Fence<D: Device>: 'static + Sized + Any {
    /// The last value the gpu has reached
    fn get_completed_value(&self) -> u64;
    /// Arrange for `event` to be signalled once the completed value reaches `value`
    fn set_event_on_completion(&self, value: u64, event: &D::Event) -> Result<()>;
}

/// An auto reset event used to block the cpu thread.
pub trait Event<D: Device>: 'static + Sized + Any {
    /// Block with no timeout until the event is signalled
    fn wait(&self) -> Result<()>;
}

/// A fixed capacity contiguous region of descriptors.
pub trait Heap<D: Device>: 'static + Sized + Any {
    fn get_heap_type(&self) -> HeapType;
    fn get_capacity(&self) -> usize;
    fn get_cpu_handle_start(&self) -> CpuDescriptorHandle;
    /// Only valid for shader visible heaps
    fn get_gpu_handle_start(&self) -> Option<GpuDescriptorHandle>;
}

pub trait Texture<D: Device>: 'static + Sized + Any {
    /// Process unique id for the underlying resource, shared by all references to it
    fn get_id(&self) -> u64;
    fn get_size(&self) -> (u64, u64);
    fn get_format(&self) -> Format;
}

pub trait Buffer<D: Device>: 'static + Sized + Any {
    fn get_size(&self) -> usize;
    /// Write `data` into the cpu visible buffer memory at `offset` bytes
    fn update<T: Sized>(&mut self, offset: usize, data: &[T]) -> Result<()>;
}

pub trait Shader<D: Device>: 'static + Sized + Any {}

pub trait RenderPipeline<D: Device>: 'static + Sized + Any {}

/// Take any sized type and return a u8 slice. This can be useful to pass `data` to
/// `Device::create_buffer`.
pub fn as_u8_slice<T: Sized>(p: &T) -> &[u8] {
    unsafe {
        ::std::slice::from_raw_parts((p as *const T) as *const u8, ::std::mem::size_of::<T>())
    }
}

/// Reinterpret a slice of `T` as bytes.
pub fn slice_as_u8_slice<T: Sized>(p: &[T]) -> &[u8] {
    unsafe { ::std::slice::from_raw_parts(p.as_ptr() as *const u8, std::mem::size_of_val(p)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_handle_arithmetic() {
        let base = CpuDescriptorHandle { ptr: 0x1000 };
        assert_eq!(descriptor_handle_at(base, 0, 32), base);
        assert_eq!(descriptor_handle_at(base, 1, 32).ptr, 0x1020);
        assert_eq!(descriptor_handle_at(base, 3, 32).ptr, 0x1060);
        let gpu = GpuDescriptorHandle { ptr: 0x10000 };
        assert_eq!(gpu_descriptor_handle_at(gpu, 2, 64).ptr, 0x10080);
    }

    #[test]
    fn constant_buffers_are_256_aligned() {
        let info = BufferInfo {
            usage: BufferUsage::ConstantBuffer,
            format: Format::Unknown,
            stride: 64,
            num_elements: 1,
            initial_state: ResourceState::GenericRead,
        };
        assert_eq!(info.size_bytes(), 256);
        assert_eq!(align_pow2(257, 256), 512);
        assert_eq!(align_pow2(0, 256), 0);
    }

    #[test]
    fn viewport_and_scissor_from_extent() {
        let vp = Viewport::from_extent(1280, 720);
        assert_eq!(
            vp,
            Viewport {
                x: 0.0,
                y: 0.0,
                width: 1280.0,
                height: 720.0,
                min_depth: 0.0,
                max_depth: 1.0
            }
        );
        let sc = ScissorRect::from_extent(1280, 720);
        assert_eq!(
            sc,
            ScissorRect {
                left: 0,
                top: 0,
                right: 1280,
                bottom: 720
            }
        );
    }
}

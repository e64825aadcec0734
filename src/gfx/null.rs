use super::{
    AdapterInfo, BufferInfo, BufferUsage, ClearColour, ClearFlags, CpuDescriptorHandle, DeviceInfo,
    Format, GpuDescriptorHandle, HeapInfo, HeapType, RenderPipelineInfo, ResourceState, ScissorRect,
    ShaderInfo, SwapChainInfo, TextureInfo, TextureUsage, Topology, TransitionBarrier, Viewport,
};
use crate::os;
use crate::Error;

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

type Result<T> = std::result::Result<T, Error>;

const RTV_INCREMENT: usize = 32;
const DSV_INCREMENT: usize = 32;
const SHADER_INCREMENT: usize = 64;
const GPU_HEAP_OFFSET: u64 = 0x1_0000_0000;
const MAX_SWAP_CHAIN_BUFFERS: u32 = 16;
// oldest trace events are dropped beyond this
const TRACE_CAPACITY: usize = 4096;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In d3d12 the common and present states share the same value.
fn states_match(actual: ResourceState, expected: ResourceState) -> bool {
    let normalise = |s| match s {
        ResourceState::Present => ResourceState::Common,
        s => s,
    };
    normalise(actual) == normalise(expected)
}

/// Ordered record of what happened on the cpu and the simulated gpu timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    AllocatorReset { allocator: u64 },
    Execute { allocator: u64, commands: usize },
    GpuExecuted { allocator: u64 },
    Signal { value: u64 },
    FenceCompleted { value: u64 },
    EventRegistered { value: u64 },
    WaitReturned { value: u64 },
    Present { index: u32 },
    ResizeBuffers { width: u32, height: u32 },
}

/// A recorded command, kept for inspection after the list is closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPipeline { pipeline: u64 },
    Barrier { resource: u64, before: ResourceState, after: ResourceState },
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    ClearRenderTarget { rtv: CpuDescriptorHandle, colour: [f32; 4] },
    ClearDepthStencil { dsv: CpuDescriptorHandle, flags: ClearFlags, depth: f32, stencil: u8 },
    SetRenderTargets { rtv: CpuDescriptorHandle, dsv: Option<CpuDescriptorHandle> },
    SetHeap { heap: u64 },
    SetDescriptorTable { slot: u32, handle: GpuDescriptorHandle },
    SetVertexBuffer { buffer: u64, slot: u32 },
    SetIndexBuffer { buffer: u64 },
    SetTopology(Topology),
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
}

enum Work {
    Execute { allocator: Arc<AllocatorState> },
    Signal { fence: Arc<FenceState>, value: u64 },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ViewKind {
    RenderTarget,
    DepthStencil,
    ConstantBuffer,
}

struct View {
    kind: ViewKind,
    resource: u64,
    texture: Option<Weak<TextureState>>,
}

struct Shared {
    trace: Mutex<VecDeque<TraceEvent>>,
    live: Mutex<HashSet<u64>>,
    heaps: Mutex<Vec<Weak<HeapState>>>,
    next_id: AtomicU64,
    next_heap_base: AtomicUsize,
    in_flight: AtomicUsize,
    latency_us: AtomicU64,
    fail_event_registration: AtomicBool,
    removed: AtomicBool,
}

impl Shared {
    fn record(&self, event: TraceEvent) {
        let mut trace = lock(&self.trace);
        if trace.len() == TRACE_CAPACITY {
            trace.pop_front();
        }
        trace.push_back(event);
    }

    fn alloc_id(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.live).insert(id);
        id
    }

    fn release_id(&self, id: u64) {
        lock(&self.live).remove(&id);
    }

    fn is_live(&self, id: u64) -> bool {
        lock(&self.live).contains(&id)
    }

    fn find_heap(&self, handle: CpuDescriptorHandle) -> Option<(Arc<HeapState>, usize)> {
        let heaps = lock(&self.heaps);
        for heap in heaps.iter().filter_map(|h| h.upgrade()) {
            let end = heap.base_cpu + heap.capacity * heap.increment;
            if handle.ptr >= heap.base_cpu && handle.ptr < end {
                let offset = handle.ptr - heap.base_cpu;
                if offset % heap.increment != 0 {
                    return None;
                }
                return Some((heap.clone(), offset / heap.increment));
            }
        }
        None
    }

    /// Returns the texture state behind a view written at `handle`, if it is live.
    fn view_texture(
        &self,
        handle: CpuDescriptorHandle,
        kind: ViewKind,
    ) -> std::result::Result<Arc<TextureState>, String> {
        let (heap, index) = self
            .find_heap(handle)
            .ok_or_else(|| format!("descriptor handle {:#x} is not inside any heap", handle.ptr))?;
        let slots = lock(&heap.slots);
        let view = slots[index].as_ref().ok_or_else(|| {
            format!("descriptor {} of heap {} has not been written", index, heap.id)
        })?;
        if view.kind != kind {
            return Err(format!(
                "descriptor {} of heap {} is a {:?} view, expected {:?}",
                index, heap.id, view.kind, kind
            ));
        }
        view.texture.as_ref().and_then(|t| t.upgrade()).ok_or_else(|| {
            format!("descriptor {} of heap {} refers to a released resource", index, heap.id)
        })
    }
}

/// Device which processes queue submissions on a worker thread standing in for the gpu.
pub struct Device {
    adapter_info: AdapterInfo,
    shared: Arc<Shared>,
    sender: Option<mpsc::Sender<Work>>,
    worker: Option<JoinHandle<()>>,
}

pub struct SwapChain {
    shared: Arc<Shared>,
    buffers: Vec<Arc<TextureState>>,
    width: u32,
    height: u32,
    format: Format,
    current: u32,
    presents: Vec<u32>,
}

struct AllocatorState {
    id: u64,
    in_flight: AtomicUsize,
    recording: AtomicBool,
}

pub struct CmdAllocator {
    state: Arc<AllocatorState>,
    shared: Arc<Shared>,
}

pub struct CmdBuf {
    shared: Arc<Shared>,
    allocator: Arc<AllocatorState>,
    closed: bool,
    commands: Vec<Command>,
    errors: Vec<String>,
}

struct FenceInner {
    value: u64,
    waiters: Vec<(u64, Arc<EventState>)>,
}

struct FenceState {
    inner: Mutex<FenceInner>,
}

impl FenceState {
    fn complete(&self, value: u64) {
        let mut inner = lock(&self.inner);
        if value > inner.value {
            inner.value = value;
        }
        let completed = inner.value;
        inner.waiters.retain(|(target, event)| {
            if *target <= completed {
                event.set(*target);
                false
            } else {
                true
            }
        });
    }
}

pub struct Fence {
    state: Arc<FenceState>,
    shared: Arc<Shared>,
}

struct EventState {
    signalled: Mutex<Option<u64>>,
    cond: Condvar,
}

impl EventState {
    fn set(&self, value: u64) {
        *lock(&self.signalled) = Some(value);
        self.cond.notify_all();
    }
}

pub struct Event {
    state: Arc<EventState>,
    shared: Arc<Shared>,
}

struct HeapState {
    id: u64,
    heap_type: HeapType,
    base_cpu: usize,
    base_gpu: Option<u64>,
    capacity: usize,
    increment: usize,
    slots: Mutex<Vec<Option<View>>>,
}

pub struct Heap {
    state: Arc<HeapState>,
    shared: Arc<Shared>,
}

struct TextureState {
    id: u64,
    width: u64,
    height: u64,
    format: Format,
    usage: TextureUsage,
    state: Mutex<ResourceState>,
    shared: Arc<Shared>,
}

impl Drop for TextureState {
    fn drop(&mut self) {
        self.shared.release_id(self.id);
    }
}

#[derive(Clone)]
pub struct Texture {
    state: Arc<TextureState>,
}

pub struct Buffer {
    id: u64,
    info: BufferInfo,
    data: Vec<u8>,
    state: Mutex<ResourceState>,
    shared: Arc<Shared>,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.shared.release_id(self.id);
    }
}

pub struct Shader {
    shader_type: super::ShaderType,
    size: usize,
}

pub struct RenderPipeline {
    id: u64,
    topology: Topology,
    num_constant_buffers: u32,
}

fn run_gpu_timeline(receiver: mpsc::Receiver<Work>, shared: Arc<Shared>) {
    for work in receiver {
        match work {
            Work::Execute { allocator } => {
                let latency = shared.latency_us.load(Ordering::SeqCst);
                if latency > 0 {
                    std::thread::sleep(Duration::from_micros(latency));
                }
                allocator.in_flight.fetch_sub(1, Ordering::SeqCst);
                shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                shared.record(TraceEvent::GpuExecuted { allocator: allocator.id });
            }
            Work::Signal { fence, value } => {
                shared.record(TraceEvent::FenceCompleted { value });
                fence.complete(value);
            }
        }
    }
}

impl Device {
    /// Create a device where every executed command list takes `latency` to complete on the gpu.
    pub fn create_with_latency(info: &DeviceInfo, latency: Duration) -> Result<Device> {
        let device = <Device as super::Device>::create(info)?;
        device.set_latency(latency);
        Ok(device)
    }

    pub fn set_latency(&self, latency: Duration) {
        self.shared.latency_us.store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// Make the next completion event registrations fail.
    pub fn set_fail_event_registration(&self, fail: bool) {
        self.shared.fail_event_registration.store(fail, Ordering::SeqCst);
    }

    /// Simulate device removal, subsequent submissions and presents fail.
    pub fn remove_device(&self) {
        self.shared.removed.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the most recent cpu / gpu events, at most `TRACE_CAPACITY` of them.
    pub fn get_trace(&self) -> Vec<TraceEvent> {
        lock(&self.shared.trace).iter().cloned().collect()
    }

    pub fn clear_trace(&self) {
        lock(&self.shared.trace).clear();
    }

    /// Returns true while any reference to the resource with `id` is alive.
    pub fn is_resource_live(&self, id: u64) -> bool {
        self.shared.is_live(id)
    }

    /// Number of executed command lists which have not yet completed on the gpu.
    pub fn get_in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    fn send(&self, work: Work) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| Error::Gpu(String::from("gpu timeline has shut down")))?
            .send(work)
            .map_err(|_| Error::Gpu(String::from("gpu timeline has shut down")))
    }

    fn check_removed(&self) -> Result<()> {
        if self.shared.removed.load(Ordering::SeqCst) {
            return Err(Error::Gpu(String::from("device removed")));
        }
        Ok(())
    }

    fn write_view(
        &self,
        handle: CpuDescriptorHandle,
        heap_type: HeapType,
        view: View,
    ) -> Result<()> {
        let (heap, index) = self.shared.find_heap(handle).ok_or_else(|| {
            Error::Validation(format!("descriptor handle {:#x} is not inside any heap", handle.ptr))
        })?;
        if heap.heap_type != heap_type {
            return Err(Error::Validation(format!(
                "{:?} view written into a {:?} heap",
                view.kind, heap.heap_type
            )));
        }
        lock(&heap.slots)[index] = Some(view);
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // closing the channel ends the timeline once queued work drains
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl super::Device for Device {
    type SwapChain = SwapChain;
    type CmdAllocator = CmdAllocator;
    type CmdBuf = CmdBuf;
    type Fence = Fence;
    type Event = Event;
    type Heap = Heap;
    type Texture = Texture;
    type Buffer = Buffer;
    type Shader = Shader;
    type RenderPipeline = RenderPipeline;

    fn create(info: &DeviceInfo) -> Result<Device> {
        let shared = Arc::new(Shared {
            trace: Mutex::new(VecDeque::with_capacity(TRACE_CAPACITY)),
            live: Mutex::new(HashSet::new()),
            heaps: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            next_heap_base: AtomicUsize::new(0x1000),
            in_flight: AtomicUsize::new(0),
            latency_us: AtomicU64::new(0),
            fail_event_registration: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        });

        let (sender, receiver) = mpsc::channel();
        let timeline = shared.clone();
        let worker = std::thread::Builder::new()
            .name(String::from("null-gpu-timeline"))
            .spawn(move || run_gpu_timeline(receiver, timeline))
            .map_err(|e| Error::Device(format!("failed to start gpu timeline: {}", e)))?;

        let name = info.adapter_name.clone().unwrap_or_else(|| String::from("null"));
        Ok(Device {
            adapter_info: AdapterInfo {
                name,
                description: String::from("simulated gpu timeline"),
                software: info.use_software_adapter,
            },
            shared,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn get_adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    fn create_swap_chain<A: os::App>(
        &self,
        info: &SwapChainInfo,
        _window: &A::Window,
    ) -> Result<SwapChain> {
        if info.num_buffers < 2 || info.num_buffers > MAX_SWAP_CHAIN_BUFFERS {
            return Err(Error::Device(format!(
                "invalid swap chain buffer count {}",
                info.num_buffers
            )));
        }
        if info.format.is_depth() {
            return Err(Error::Device(format!("invalid swap chain format {:?}", info.format)));
        }
        let mut swap_chain = SwapChain {
            shared: self.shared.clone(),
            buffers: Vec::new(),
            width: info.width,
            height: info.height,
            format: info.format,
            current: 0,
            presents: Vec::new(),
        };
        swap_chain.create_buffers(info.num_buffers);
        Ok(swap_chain)
    }

    fn create_cmd_allocator(&self) -> Result<CmdAllocator> {
        Ok(CmdAllocator {
            state: Arc::new(AllocatorState {
                id: self.shared.alloc_id(),
                in_flight: AtomicUsize::new(0),
                recording: AtomicBool::new(false),
            }),
            shared: self.shared.clone(),
        })
    }

    fn create_cmd_buf(&self, allocator: &CmdAllocator) -> Result<CmdBuf> {
        if allocator.state.recording.swap(true, Ordering::SeqCst) {
            return Err(Error::Validation(String::from(
                "command allocator already has a command list recording",
            )));
        }
        Ok(CmdBuf {
            shared: self.shared.clone(),
            allocator: allocator.state.clone(),
            closed: false,
            commands: Vec::new(),
            errors: Vec::new(),
        })
    }

    fn create_fence(&self, initial_value: u64) -> Result<Fence> {
        Ok(Fence {
            state: Arc::new(FenceState {
                inner: Mutex::new(FenceInner {
                    value: initial_value,
                    waiters: Vec::new(),
                }),
            }),
            shared: self.shared.clone(),
        })
    }

    fn create_event(&self) -> Result<Event> {
        Ok(Event {
            state: Arc::new(EventState {
                signalled: Mutex::new(None),
                cond: Condvar::new(),
            }),
            shared: self.shared.clone(),
        })
    }

    fn create_heap(&self, info: &HeapInfo) -> Result<Heap> {
        if info.num_descriptors == 0 {
            return Err(Error::Device(String::from("descriptor heap capacity must be non zero")));
        }
        let increment = self.get_descriptor_increment_size(info.heap_type);
        let size = super::align_pow2(info.num_descriptors * increment, 0x1000) + 0x1000;
        let base_cpu = self.shared.next_heap_base.fetch_add(size, Ordering::SeqCst);
        let base_gpu = if info.heap_type.is_shader_visible() {
            Some(GPU_HEAP_OFFSET + base_cpu as u64)
        } else {
            None
        };
        let mut slots = Vec::with_capacity(info.num_descriptors);
        slots.resize_with(info.num_descriptors, || None);
        let state = Arc::new(HeapState {
            id: self.shared.alloc_id(),
            heap_type: info.heap_type,
            base_cpu,
            base_gpu,
            capacity: info.num_descriptors,
            increment,
            slots: Mutex::new(slots),
        });
        lock(&self.shared.heaps).push(Arc::downgrade(&state));
        Ok(Heap {
            state,
            shared: self.shared.clone(),
        })
    }

    fn get_descriptor_increment_size(&self, heap_type: HeapType) -> usize {
        match heap_type {
            HeapType::RenderTarget => RTV_INCREMENT,
            HeapType::DepthStencil => DSV_INCREMENT,
            HeapType::Shader => SHADER_INCREMENT,
        }
    }

    fn create_texture(&self, info: &TextureInfo) -> Result<Texture> {
        if info.width == 0 || info.height == 0 {
            return Err(Error::Device(format!(
                "invalid texture size {}x{}",
                info.width, info.height
            )));
        }
        if info.usage.contains(TextureUsage::DEPTH_STENCIL) && !info.format.is_depth() {
            return Err(Error::Device(format!("{:?} is not a depth stencil format", info.format)));
        }
        Ok(Texture {
            state: Arc::new(TextureState {
                id: self.shared.alloc_id(),
                width: info.width,
                height: info.height,
                format: info.format,
                usage: info.usage,
                state: Mutex::new(info.initial_state),
                shared: self.shared.clone(),
            }),
        })
    }

    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Buffer> {
        let size = info.size_bytes();
        if size == 0 {
            return Err(Error::Device(String::from("buffer size must be non zero")));
        }
        let mut contents = vec![0u8; size];
        if let Some(data) = data {
            if data.len() > size {
                return Err(Error::Device(format!(
                    "initial data {} bytes exceeds buffer size {}",
                    data.len(),
                    size
                )));
            }
            contents[..data.len()].copy_from_slice(data);
        }
        Ok(Buffer {
            id: self.shared.alloc_id(),
            info: *info,
            data: contents,
            state: Mutex::new(info.initial_state),
            shared: self.shared.clone(),
        })
    }

    fn create_shader(&self, info: &ShaderInfo, src: &[u8]) -> Result<Shader> {
        if src.is_empty() {
            return Err(Error::Device(String::from("empty shader")));
        }
        Ok(Shader {
            shader_type: info.shader_type,
            size: src.len(),
        })
    }

    fn create_render_pipeline(&self, info: &RenderPipelineInfo<Self>) -> Result<RenderPipeline> {
        match (info.vs, info.fs) {
            (Some(vs), Some(fs)) => {
                if vs.shader_type != super::ShaderType::Vertex
                    || fs.shader_type != super::ShaderType::Fragment
                {
                    return Err(Error::Device(String::from("mismatched shader stages")));
                }
            }
            _ => {
                return Err(Error::Device(String::from(
                    "render pipeline requires a vertex and fragment shader",
                )))
            }
        }
        if info.render_target_format.is_depth() {
            return Err(Error::Device(format!(
                "{:?} is not a render target format",
                info.render_target_format
            )));
        }
        if info.depth_test && !info.depth_stencil_format.is_depth() {
            return Err(Error::Device(format!(
                "{:?} is not a depth stencil format",
                info.depth_stencil_format
            )));
        }
        Ok(RenderPipeline {
            id: self.shared.alloc_id(),
            topology: info.topology,
            num_constant_buffers: info.num_constant_buffers,
        })
    }

    fn create_render_target_view(
        &self,
        texture: &Texture,
        handle: CpuDescriptorHandle,
    ) -> Result<()> {
        if !texture.state.usage.contains(TextureUsage::RENDER_TARGET) {
            return Err(Error::Validation(String::from(
                "texture was not created with render target usage",
            )));
        }
        self.write_view(
            handle,
            HeapType::RenderTarget,
            View {
                kind: ViewKind::RenderTarget,
                resource: texture.state.id,
                texture: Some(Arc::downgrade(&texture.state)),
            },
        )
    }

    fn create_depth_stencil_view(
        &self,
        texture: &Texture,
        format: Format,
        handle: CpuDescriptorHandle,
    ) -> Result<()> {
        if !texture.state.usage.contains(TextureUsage::DEPTH_STENCIL) || !format.is_depth() {
            return Err(Error::Validation(String::from(
                "depth stencil view requires a depth texture and format",
            )));
        }
        self.write_view(
            handle,
            HeapType::DepthStencil,
            View {
                kind: ViewKind::DepthStencil,
                resource: texture.state.id,
                texture: Some(Arc::downgrade(&texture.state)),
            },
        )
    }

    fn create_constant_buffer_view(
        &self,
        buffer: &Buffer,
        handle: CpuDescriptorHandle,
    ) -> Result<()> {
        if buffer.info.usage != BufferUsage::ConstantBuffer || buffer.data.len() % 256 != 0 {
            return Err(Error::Validation(String::from(
                "constant buffer views require a 256 byte aligned constant buffer",
            )));
        }
        self.write_view(
            handle,
            HeapType::Shader,
            View {
                kind: ViewKind::ConstantBuffer,
                resource: buffer.id,
                texture: None,
            },
        )
    }

    fn execute(&self, cmd: &CmdBuf) -> Result<()> {
        self.check_removed()?;
        if !cmd.closed {
            return Err(Error::Validation(String::from(
                "executing a command list which is not closed",
            )));
        }
        if !cmd.errors.is_empty() {
            return Err(Error::Validation(cmd.errors.join("; ")));
        }
        cmd.allocator.in_flight.fetch_add(1, Ordering::SeqCst);
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        self.shared.record(TraceEvent::Execute {
            allocator: cmd.allocator.id,
            commands: cmd.commands.len(),
        });
        self.send(Work::Execute {
            allocator: cmd.allocator.clone(),
        })
    }

    fn signal(&self, fence: &Fence, value: u64) -> Result<()> {
        self.check_removed()?;
        self.shared.record(TraceEvent::Signal { value });
        self.send(Work::Signal {
            fence: fence.state.clone(),
            value,
        })
    }
}

impl SwapChain {
    fn create_buffers(&mut self, num_buffers: u32) {
        self.buffers = (0..num_buffers)
            .map(|_| {
                Arc::new(TextureState {
                    id: self.shared.alloc_id(),
                    width: self.width as u64,
                    height: self.height as u64,
                    format: self.format,
                    usage: TextureUsage::RENDER_TARGET,
                    state: Mutex::new(ResourceState::Present),
                    shared: self.shared.clone(),
                })
            })
            .collect();
        self.current = 0;
    }

    /// Index of the back buffer the next present will display.
    pub fn get_current_backbuffer_index(&self) -> u32 {
        self.current
    }

    /// Back buffer indices in the order they were presented.
    pub fn get_present_history(&self) -> &[u32] {
        &self.presents
    }
}

impl super::SwapChain<Device> for SwapChain {
    fn get_num_buffers(&self) -> u32 {
        self.buffers.len() as u32
    }

    fn get_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn get_buffer(&self, index: u32) -> Result<Texture> {
        self.buffers
            .get(index as usize)
            .map(|state| Texture { state: state.clone() })
            .ok_or_else(|| Error::Gpu(format!("swap chain has no buffer {}", index)))
    }

    fn resize_buffers(
        &mut self,
        num_buffers: u32,
        width: u32,
        height: u32,
        format: Format,
    ) -> Result<()> {
        if self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            return Err(Error::Validation(String::from(
                "swap chain resized while gpu work referencing the back buffers is in flight",
            )));
        }
        if self.buffers.iter().any(|b| Arc::strong_count(b) > 1) {
            return Err(Error::Validation(String::from(
                "swap chain resized while references to its back buffers are still held",
            )));
        }
        if width == 0 || height == 0 {
            return Err(Error::Gpu(format!("invalid swap chain size {}x{}", width, height)));
        }
        if num_buffers < 2 || num_buffers > MAX_SWAP_CHAIN_BUFFERS {
            return Err(Error::Gpu(format!("invalid swap chain buffer count {}", num_buffers)));
        }
        self.width = width;
        self.height = height;
        if format != Format::Unknown {
            self.format = format;
        }
        self.create_buffers(num_buffers);
        self.shared.record(TraceEvent::ResizeBuffers { width, height });
        Ok(())
    }

    fn present(&mut self, _sync_interval: u32) -> Result<()> {
        if self.shared.removed.load(Ordering::SeqCst) {
            return Err(Error::Gpu(String::from("present failed: device removed")));
        }
        let buffer = &self.buffers[self.current as usize];
        let state = *lock(&buffer.state);
        if !states_match(state, ResourceState::Present) {
            return Err(Error::Validation(format!(
                "back buffer {} presented while in state {:?}",
                self.current, state
            )));
        }
        self.shared.record(TraceEvent::Present { index: self.current });
        self.presents.push(self.current);
        self.current = (self.current + 1) % self.buffers.len() as u32;
        Ok(())
    }
}

impl CmdAllocator {
    pub fn get_id(&self) -> u64 {
        self.state.id
    }
}

impl super::CmdAllocator<Device> for CmdAllocator {
    fn reset(&mut self) -> Result<()> {
        if self.state.in_flight.load(Ordering::SeqCst) > 0 {
            return Err(Error::Validation(String::from(
                "command allocator reset while its command lists are executing on the gpu",
            )));
        }
        if self.state.recording.load(Ordering::SeqCst) {
            return Err(Error::Validation(String::from(
                "command allocator reset while a command list is recording",
            )));
        }
        self.shared.record(TraceEvent::AllocatorReset { allocator: self.state.id });
        Ok(())
    }
}

impl CmdBuf {
    /// Commands recorded since the last reset.
    pub fn get_commands(&self) -> &[Command] {
        &self.commands
    }

    fn push(&mut self, command: Command) {
        if self.closed {
            self.errors.push(format!("{:?} recorded on a closed command list", command));
        }
        self.commands.push(command);
    }

    fn check_view(&mut self, handle: CpuDescriptorHandle, kind: ViewKind, expected: ResourceState) {
        match self.shared.view_texture(handle, kind) {
            Ok(texture) => {
                let state = *lock(&texture.state);
                if !states_match(state, expected) {
                    self.errors.push(format!(
                        "resource {} used as {:?} while in state {:?}",
                        texture.id, kind, state
                    ));
                }
            }
            Err(msg) => self.errors.push(msg),
        }
    }
}

impl super::CmdBuf<Device> for CmdBuf {
    fn reset(&mut self, allocator: &CmdAllocator, pipeline: Option<&RenderPipeline>) -> Result<()> {
        if !self.closed {
            return Err(Error::Validation(String::from(
                "reset of a command list which is still recording",
            )));
        }
        if allocator.state.recording.swap(true, Ordering::SeqCst) {
            return Err(Error::Validation(String::from(
                "command allocator already has a command list recording",
            )));
        }
        self.allocator = allocator.state.clone();
        self.closed = false;
        self.commands.clear();
        self.errors.clear();
        if let Some(pipeline) = pipeline {
            self.commands.push(Command::SetPipeline { pipeline: pipeline.id });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Validation(String::from(
                "close of a command list which is already closed",
            )));
        }
        self.closed = true;
        self.allocator.recording.store(false, Ordering::SeqCst);
        if !self.errors.is_empty() {
            return Err(Error::Validation(self.errors.join("; ")));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn transition_barrier(&mut self, barrier: &TransitionBarrier<Device>) {
        let (id, state) = match (barrier.texture, barrier.buffer) {
            (Some(texture), None) => (texture.state.id, &texture.state.state),
            (None, Some(buffer)) => (buffer.id, &buffer.state),
            _ => {
                self.errors.push(String::from("transition barrier requires exactly one resource"));
                return;
            }
        };
        {
            let mut current = lock(state);
            if states_match(barrier.state_before, barrier.state_after) {
                self.errors.push(format!(
                    "transition barrier on resource {} has identical before and after states {:?}",
                    id, barrier.state_before
                ));
            } else if !states_match(*current, barrier.state_before) {
                self.errors.push(format!(
                    "transition barrier on resource {} expects {:?} but the resource is in {:?}",
                    id, barrier.state_before, *current
                ));
            } else {
                *current = barrier.state_after;
            }
        }
        self.push(Command::Barrier {
            resource: id,
            before: barrier.state_before,
            after: barrier.state_after,
        });
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.push(Command::SetViewport(*viewport));
    }

    fn set_scissor_rect(&mut self, scissor_rect: &ScissorRect) {
        self.push(Command::SetScissorRect(*scissor_rect));
    }

    fn clear_render_target(&mut self, rtv: CpuDescriptorHandle, colour: ClearColour) {
        self.check_view(rtv, ViewKind::RenderTarget, ResourceState::RenderTarget);
        self.push(Command::ClearRenderTarget {
            rtv,
            colour: colour.as_array(),
        });
    }

    fn clear_depth_stencil(
        &mut self,
        dsv: CpuDescriptorHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) {
        self.check_view(dsv, ViewKind::DepthStencil, ResourceState::DepthWrite);
        self.push(Command::ClearDepthStencil {
            dsv,
            flags,
            depth,
            stencil,
        });
    }

    fn set_render_targets(&mut self, rtv: CpuDescriptorHandle, dsv: Option<CpuDescriptorHandle>) {
        self.check_view(rtv, ViewKind::RenderTarget, ResourceState::RenderTarget);
        if let Some(dsv) = dsv {
            self.check_view(dsv, ViewKind::DepthStencil, ResourceState::DepthWrite);
        }
        self.push(Command::SetRenderTargets { rtv, dsv });
    }

    fn set_heap(&mut self, heap: &Heap) {
        if !heap.state.heap_type.is_shader_visible() {
            self.errors.push(String::from("only shader visible heaps can be bound"));
        }
        self.push(Command::SetHeap { heap: heap.state.id });
    }

    fn set_render_pipeline(&mut self, pipeline: &RenderPipeline) {
        self.push(Command::SetPipeline { pipeline: pipeline.id });
    }

    fn set_render_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle) {
        self.push(Command::SetDescriptorTable { slot, handle });
    }

    fn set_vertex_buffer(&mut self, buffer: &Buffer, slot: u32) {
        if buffer.info.usage != BufferUsage::Vertex {
            self.errors.push(format!("buffer {} bound as a vertex buffer", buffer.id));
        }
        self.push(Command::SetVertexBuffer { buffer: buffer.id, slot });
    }

    fn set_index_buffer(&mut self, buffer: &Buffer) {
        if buffer.info.usage != BufferUsage::Index {
            self.errors.push(format!("buffer {} bound as an index buffer", buffer.id));
        }
        self.push(Command::SetIndexBuffer { buffer: buffer.id });
    }

    fn set_topology(&mut self, topology: Topology) {
        self.push(Command::SetTopology(topology));
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.push(Command::DrawIndexed {
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }
}

impl super::Fence<Device> for Fence {
    fn get_completed_value(&self) -> u64 {
        lock(&self.state.inner).value
    }

    fn set_event_on_completion(&self, value: u64, event: &Event) -> Result<()> {
        if self.shared.fail_event_registration.load(Ordering::SeqCst) {
            return Err(Error::Sync(format!(
                "failed to register completion event for fence value {}",
                value
            )));
        }
        self.shared.record(TraceEvent::EventRegistered { value });
        let mut inner = lock(&self.state.inner);
        if inner.value >= value {
            event.state.set(value);
        } else {
            inner.waiters.push((value, event.state.clone()));
        }
        Ok(())
    }
}

impl super::Event<Device> for Event {
    fn wait(&self) -> Result<()> {
        let mut signalled = lock(&self.state.signalled);
        loop {
            if let Some(value) = signalled.take() {
                self.shared.record(TraceEvent::WaitReturned { value });
                return Ok(());
            }
            signalled = self
                .state
                .cond
                .wait(signalled)
                .map_err(|_| Error::Sync(String::from("completion event wait was poisoned")))?;
        }
    }
}

impl Heap {
    /// Number of slots holding a view of a resource which is still alive.
    pub fn get_live_view_count(&self) -> usize {
        lock(&self.state.slots)
            .iter()
            .flatten()
            .filter(|view| self.shared.is_live(view.resource))
            .count()
    }

    /// Id of the resource whose view is written at `index`, if any.
    pub fn get_view_resource(&self, index: usize) -> Option<u64> {
        lock(&self.state.slots).get(index).and_then(|v| v.as_ref().map(|v| v.resource))
    }

    pub fn get_id(&self) -> u64 {
        self.state.id
    }
}

impl super::Heap<Device> for Heap {
    fn get_heap_type(&self) -> HeapType {
        self.state.heap_type
    }

    fn get_capacity(&self) -> usize {
        self.state.capacity
    }

    fn get_cpu_handle_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle { ptr: self.state.base_cpu }
    }

    fn get_gpu_handle_start(&self) -> Option<GpuDescriptorHandle> {
        self.state.base_gpu.map(|ptr| GpuDescriptorHandle { ptr })
    }
}

impl Texture {
    /// Current tracked resource state.
    pub fn get_state(&self) -> ResourceState {
        *lock(&self.state.state)
    }
}

impl super::Texture<Device> for Texture {
    fn get_id(&self) -> u64 {
        self.state.id
    }

    fn get_size(&self) -> (u64, u64) {
        (self.state.width, self.state.height)
    }

    fn get_format(&self) -> Format {
        self.state.format
    }
}

impl Buffer {
    pub fn get_id(&self) -> u64 {
        self.id
    }

    /// Cpu visible contents of the buffer.
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }
}

impl super::Buffer<Device> for Buffer {
    fn get_size(&self) -> usize {
        self.data.len()
    }

    fn update<T: Sized>(&mut self, offset: usize, data: &[T]) -> Result<()> {
        let bytes = super::slice_as_u8_slice(data);
        let end = offset + bytes.len();
        if end > self.data.len() {
            return Err(Error::Gpu(format!(
                "buffer update of {} bytes at {} exceeds buffer size {}",
                bytes.len(),
                offset,
                self.data.len()
            )));
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl Shader {
    pub fn get_size(&self) -> usize {
        self.size
    }
}

impl super::Shader<Device> for Shader {}

impl RenderPipeline {
    pub fn get_topology(&self) -> Topology {
        self.topology
    }

    pub fn get_num_constant_buffers(&self) -> u32 {
        self.num_constant_buffers
    }
}

impl super::RenderPipeline<Device> for RenderPipeline {}

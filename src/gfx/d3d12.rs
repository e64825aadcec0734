use super::{
    AdapterInfo, BufferInfo, BufferUsage, ClearColour, ClearFlags, CpuDescriptorHandle, DeviceInfo,
    Format, GpuDescriptorHandle, HeapInfo, HeapType, RenderPipelineInfo, ResourceState, ScissorRect,
    ShaderInfo, SwapChainInfo, TextureInfo, TextureUsage, Topology, TransitionBarrier, Viewport,
};
use crate::os::{self, NativeHandle as _, Window as _};
use crate::Error;

use std::ffi::CString;
use std::mem::ManuallyDrop;

use windows::{
    core::*, Win32::Foundation::*, Win32::Graphics::Direct3D::Fxc::*, Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D12::*, Win32::Graphics::Dxgi::Common::*, Win32::Graphics::Dxgi::*,
    Win32::System::Threading::*,
};

type Result<T> = std::result::Result<T, Error>;

pub struct Device {
    adapter_info: AdapterInfo,
    dxgi_factory: IDXGIFactory4,
    device: ID3D12Device,
    command_queue: ID3D12CommandQueue,
}

pub struct SwapChain {
    swap_chain: IDXGISwapChain3,
    num_buffers: u32,
    width: u32,
    height: u32,
    format: Format,
}

pub struct CmdAllocator {
    allocator: ID3D12CommandAllocator,
}

pub struct CmdBuf {
    cmd: ID3D12GraphicsCommandList,
    closed: bool,
}

pub struct Fence {
    fence: ID3D12Fence,
}

pub struct Event {
    handle: HANDLE,
}

pub struct Heap {
    heap: ID3D12DescriptorHeap,
    heap_type: HeapType,
    capacity: usize,
}

#[derive(Clone)]
pub struct Texture {
    resource: ID3D12Resource,
    width: u64,
    height: u64,
    format: Format,
}

pub struct Buffer {
    resource: ID3D12Resource,
    size: usize,
    vbv: Option<D3D12_VERTEX_BUFFER_VIEW>,
    ibv: Option<D3D12_INDEX_BUFFER_VIEW>,
}

pub struct Shader {
    blob: ID3DBlob,
}

pub struct RenderPipeline {
    pso: ID3D12PipelineState,
    root_signature: ID3D12RootSignature,
}

pub fn to_dxgi_format(format: Format) -> DXGI_FORMAT {
    match format {
        Format::Unknown => DXGI_FORMAT_UNKNOWN,
        Format::RGBA8n => DXGI_FORMAT_R8G8B8A8_UNORM,
        Format::RGB32f => DXGI_FORMAT_R32G32B32_FLOAT,
        Format::RGBA32f => DXGI_FORMAT_R32G32B32A32_FLOAT,
        Format::R16u => DXGI_FORMAT_R16_UINT,
        Format::D32f => DXGI_FORMAT_D32_FLOAT,
        Format::D24nS8u => DXGI_FORMAT_D24_UNORM_S8_UINT,
    }
}

fn to_d3d12_resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Common => D3D12_RESOURCE_STATE_COMMON,
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
        ResourceState::DepthWrite => D3D12_RESOURCE_STATE_DEPTH_WRITE,
        ResourceState::DepthRead => D3D12_RESOURCE_STATE_DEPTH_READ,
        ResourceState::GenericRead => D3D12_RESOURCE_STATE_GENERIC_READ,
    }
}

fn to_d3d12_heap_type(heap_type: HeapType) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match heap_type {
        HeapType::RenderTarget => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
        HeapType::DepthStencil => D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        HeapType::Shader => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
    }
}

fn to_d3d12_topology(topology: Topology) -> D3D_PRIMITIVE_TOPOLOGY {
    match topology {
        Topology::TriangleList => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
    }
}

fn to_d3d12_topology_type(topology: Topology) -> D3D12_PRIMITIVE_TOPOLOGY_TYPE {
    match topology {
        Topology::TriangleList => D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
    }
}

fn cpu_handle(handle: CpuDescriptorHandle) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}

fn blob_as_slice(blob: &ID3DBlob) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
    }
}

fn blob_to_string(blob: &ID3DBlob) -> String {
    String::from_utf8_lossy(blob_as_slice(blob)).trim_end_matches('\0').to_string()
}

fn adapter_name(desc: &DXGI_ADAPTER_DESC1) -> String {
    let len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
    String::from_utf16_lossy(&desc.Description[..len])
}

fn transition_barrier(
    resource: &ID3D12Resource,
    state_before: D3D12_RESOURCE_STATES,
    state_after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                // borrowed without an add ref, the barrier never releases it
                pResource: unsafe { std::mem::transmute_copy(resource) },
                StateBefore: state_before,
                StateAfter: state_after,
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
            }),
        },
    }
}

/// First hardware adapter supporting d3d12, optionally matching `name`.
fn get_hardware_adapter(
    factory: &IDXGIFactory4,
    name: &Option<String>,
) -> Result<(IDXGIAdapter1, String)> {
    unsafe {
        for i in 0.. {
            let adapter = match factory.EnumAdapters1(i) {
                Ok(adapter) => adapter,
                Err(_) => break,
            };
            let desc = adapter.GetDesc1()?;
            if (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0 {
                continue;
            }
            let description = adapter_name(&desc);
            if let Some(name) = name {
                if !description.contains(name.as_str()) {
                    continue;
                }
            }
            if D3D12CreateDevice(
                &adapter,
                D3D_FEATURE_LEVEL_11_0,
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )
            .is_ok()
            {
                return Ok((adapter, description));
            }
        }
    }
    Err(Error::Device(String::from("no hardware adapter supports d3d12")))
}

fn enable_debug_layer() {
    unsafe {
        let mut debug: Option<ID3D12Debug> = None;
        if D3D12GetDebugInterface(&mut debug).is_ok() {
            if let Some(debug) = debug {
                debug.EnableDebugLayer();
                tracing::info!("d3d12 debug layer enabled");
            }
        }
    }
}

fn break_on_errors(device: &ID3D12Device) {
    unsafe {
        if let Ok(info_queue) = device.cast::<ID3D12InfoQueue>() {
            let _ = info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_CORRUPTION, true);
            let _ = info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_ERROR, true);
            let _ = info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_WARNING, true);
        }
    }
}

fn create_root_signature(
    device: &ID3D12Device,
    num_constant_buffers: u32,
) -> Result<ID3D12RootSignature> {
    let range = D3D12_DESCRIPTOR_RANGE {
        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
        NumDescriptors: num_constant_buffers,
        BaseShaderRegister: 0,
        RegisterSpace: 0,
        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
    };
    let params = [D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                NumDescriptorRanges: 1,
                pDescriptorRanges: &range,
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }];
    let num_params = if num_constant_buffers > 0 { 1 } else { 0 };
    let desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: num_params,
        pParameters: params.as_ptr(),
        NumStaticSamplers: 0,
        pStaticSamplers: std::ptr::null(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    unsafe {
        let mut signature: Option<ID3DBlob> = None;
        let mut errors: Option<ID3DBlob> = None;
        if let Err(err) = D3D12SerializeRootSignature(
            &desc,
            D3D_ROOT_SIGNATURE_VERSION_1,
            &mut signature,
            Some(&mut errors),
        ) {
            let msg = errors
                .as_ref()
                .map(blob_to_string)
                .unwrap_or_else(|| err.message().to_string());
            return Err(Error::Device(format!("failed to serialise root signature: {}", msg)));
        }
        let signature = signature.ok_or_else(|| {
            Error::Device(String::from("root signature serialisation returned no blob"))
        })?;
        Ok(device.CreateRootSignature(0, blob_as_slice(&signature))?)
    }
}

impl Device {
    fn create_upload_resource(&self, size: usize) -> Result<ID3D12Resource> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_UPLOAD,
            CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 1,
            VisibleNodeMask: 1,
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Alignment: 0,
            Width: size as u64,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_UNKNOWN,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            Flags: D3D12_RESOURCE_FLAG_NONE,
        };
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.device.CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                D3D12_RESOURCE_STATE_GENERIC_READ,
                None,
                &mut resource,
            )?;
        }
        resource.ok_or_else(|| {
            Error::Device(String::from("CreateCommittedResource returned no buffer"))
        })
    }
}

fn write_mapped(resource: &ID3D12Resource, offset: usize, data: &[u8]) -> Result<()> {
    unsafe {
        let mut ptr: *mut std::ffi::c_void = std::ptr::null_mut();
        resource.Map(0, None, Some(&mut ptr))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), (ptr as *mut u8).add(offset), data.len());
        resource.Unmap(0, None);
    }
    Ok(())
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
        // validation instrumentation is never enabled in release builds
        let debug = info.debug_layer && cfg!(debug_assertions);
        if debug {
            enable_debug_layer();
        }

        unsafe {
            let factory_flags = if debug {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let dxgi_factory: IDXGIFactory4 = CreateDXGIFactory2(factory_flags)?;

            let hardware = if info.use_software_adapter {
                None
            } else {
                match get_hardware_adapter(&dxgi_factory, &info.adapter_name) {
                    Ok(adapter) => Some(adapter),
                    Err(err) => {
                        tracing::warn!("{}, falling back to warp", err);
                        None
                    }
                }
            };
            let (adapter, name, software) = match hardware {
                Some((adapter, name)) => (adapter, name, false),
                None => {
                    let warp: IDXGIAdapter1 = dxgi_factory.EnumWarpAdapter()?;
                    let name = adapter_name(&warp.GetDesc1()?);
                    (warp, name, true)
                }
            };

            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device)?;
            let device = device.ok_or_else(|| {
                Error::Device(String::from("D3D12CreateDevice returned no device"))
            })?;

            if debug {
                break_on_errors(&device);
            }

            let command_queue: ID3D12CommandQueue =
                device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                    Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                    ..Default::default()
                })?;

            Ok(Device {
                adapter_info: AdapterInfo {
                    name,
                    description: String::from("Direct3D12"),
                    software,
                },
                dxgi_factory,
                device,
                command_queue,
            })
        }
    }

    fn get_adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    fn create_swap_chain<A: os::App>(
        &self,
        info: &SwapChainInfo,
        window: &A::Window,
    ) -> Result<SwapChain> {
        let hwnd = HWND(window.get_native_handle().get_isize() as *mut std::ffi::c_void);
        let desc = DXGI_SWAP_CHAIN_DESC1 {
            BufferCount: info.num_buffers,
            Width: info.width,
            Height: info.height,
            Format: to_dxgi_format(info.format),
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH.0 as u32,
            ..Default::default()
        };
        unsafe {
            let swap_chain: IDXGISwapChain1 =
                self.dxgi_factory
                    .CreateSwapChainForHwnd(&self.command_queue, hwnd, &desc, None, None)?;
            Ok(SwapChain {
                swap_chain: swap_chain.cast()?,
                num_buffers: info.num_buffers,
                width: info.width,
                height: info.height,
                format: info.format,
            })
        }
    }

    fn create_cmd_allocator(&self) -> Result<CmdAllocator> {
        unsafe {
            Ok(CmdAllocator {
                allocator: self.device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)?,
            })
        }
    }

    fn create_cmd_buf(&self, allocator: &CmdAllocator) -> Result<CmdBuf> {
        unsafe {
            let cmd: ID3D12GraphicsCommandList = self.device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &allocator.allocator,
                None,
            )?;
            Ok(CmdBuf { cmd, closed: false })
        }
    }

    fn create_fence(&self, initial_value: u64) -> Result<Fence> {
        unsafe {
            Ok(Fence {
                fence: self.device.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE)?,
            })
        }
    }

    fn create_event(&self) -> Result<Event> {
        unsafe {
            let handle = CreateEventA(None, false, false, PCSTR::null()).map_err(|e| {
                Error::Sync(format!("failed to create fence event: {}", e.message()))
            })?;
            Ok(Event { handle })
        }
    }

    fn create_heap(&self, info: &HeapInfo) -> Result<Heap> {
        let flags = if info.heap_type.is_shader_visible() {
            D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
        } else {
            D3D12_DESCRIPTOR_HEAP_FLAG_NONE
        };
        unsafe {
            let heap: ID3D12DescriptorHeap =
                self.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                    Type: to_d3d12_heap_type(info.heap_type),
                    NumDescriptors: info.num_descriptors as u32,
                    Flags: flags,
                    NodeMask: 0,
                })?;
            Ok(Heap {
                heap,
                heap_type: info.heap_type,
                capacity: info.num_descriptors,
            })
        }
    }

    fn get_descriptor_increment_size(&self, heap_type: HeapType) -> usize {
        unsafe {
            self.device
                .GetDescriptorHandleIncrementSize(to_d3d12_heap_type(heap_type)) as usize
        }
    }

    fn create_texture(&self, info: &TextureInfo) -> Result<Texture> {
        let mut flags = D3D12_RESOURCE_FLAG_NONE;
        if info.usage.contains(TextureUsage::RENDER_TARGET) {
            flags |= D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET;
        }
        if info.usage.contains(TextureUsage::DEPTH_STENCIL) {
            flags |= D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL;
        }

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 1,
            VisibleNodeMask: 1,
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Alignment: 0,
            Width: info.width,
            Height: info.height as u32,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: to_dxgi_format(info.format),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: flags,
        };
        let clear_value = info.depth_stencil_clear.map(|clear| D3D12_CLEAR_VALUE {
            Format: to_dxgi_format(info.format),
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                    Depth: clear.depth,
                    Stencil: clear.stencil,
                },
            },
        });

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.device.CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                to_d3d12_resource_state(info.initial_state),
                clear_value.as_ref().map(|c| c as *const D3D12_CLEAR_VALUE),
                &mut resource,
            )?;
        }
        Ok(Texture {
            resource: resource.ok_or_else(|| {
                Error::Device(String::from("CreateCommittedResource returned no texture"))
            })?,
            width: info.width,
            height: info.height,
            format: info.format,
        })
    }

    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Buffer> {
        let size = info.size_bytes();
        let resource = self.create_upload_resource(size)?;
        if let Some(data) = data {
            if data.len() > size {
                return Err(Error::Device(format!(
                    "initial data {} bytes exceeds buffer size {}",
                    data.len(),
                    size
                )));
            }
            write_mapped(&resource, 0, data)?;
        }

        let location = unsafe { resource.GetGPUVirtualAddress() };
        let (vbv, ibv) = match info.usage {
            BufferUsage::Vertex => (
                Some(D3D12_VERTEX_BUFFER_VIEW {
                    BufferLocation: location,
                    SizeInBytes: size as u32,
                    StrideInBytes: info.stride as u32,
                }),
                None,
            ),
            BufferUsage::Index => (
                None,
                Some(D3D12_INDEX_BUFFER_VIEW {
                    BufferLocation: location,
                    SizeInBytes: size as u32,
                    Format: to_dxgi_format(info.format),
                }),
            ),
            BufferUsage::ConstantBuffer => (None, None),
        };

        Ok(Buffer {
            resource,
            size,
            vbv,
            ibv,
        })
    }

    fn create_shader(&self, info: &ShaderInfo, src: &[u8]) -> Result<Shader> {
        let compile_info = match &info.compile_info {
            Some(compile_info) => compile_info,
            None => unsafe {
                // precompiled byte code
                let blob = D3DCreateBlob(src.len())?;
                std::ptr::copy_nonoverlapping(
                    src.as_ptr(),
                    blob.GetBufferPointer() as *mut u8,
                    src.len(),
                );
                return Ok(Shader { blob });
            },
        };

        let flags = if compile_info.debug {
            D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
        } else {
            0
        };
        let entry_point = CString::new(compile_info.entry_point.as_str())
            .map_err(|e| Error::Device(format!("invalid shader entry point: {}", e)))?;
        let target = CString::new(compile_info.target.as_str())
            .map_err(|e| Error::Device(format!("invalid shader target: {}", e)))?;

        unsafe {
            let mut blob: Option<ID3DBlob> = None;
            let mut errors: Option<ID3DBlob> = None;
            let result = D3DCompile(
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                None,
                None,
                None,
                PCSTR(entry_point.as_ptr() as *const u8),
                PCSTR(target.as_ptr() as *const u8),
                flags,
                0,
                &mut blob,
                Some(&mut errors),
            );
            if let Err(err) = result {
                let msg = errors
                    .as_ref()
                    .map(blob_to_string)
                    .unwrap_or_else(|| err.message().to_string());
                return Err(Error::Device(format!(
                    "failed to compile {:?} shader {}: {}",
                    info.shader_type, compile_info.entry_point, msg
                )));
            }
            let blob = blob
                .ok_or_else(|| Error::Device(String::from("D3DCompile returned no byte code")))?;
            Ok(Shader { blob })
        }
    }

    fn create_render_pipeline(&self, info: &RenderPipelineInfo<Self>) -> Result<RenderPipeline> {
        let (vs, fs) = match (info.vs, info.fs) {
            (Some(vs), Some(fs)) => (vs, fs),
            _ => {
                return Err(Error::Device(String::from(
                    "render pipeline requires a vertex and fragment shader",
                )))
            }
        };

        let root_signature = create_root_signature(&self.device, info.num_constant_buffers)?;

        let semantics = info
            .input_layout
            .iter()
            .map(|element| CString::new(element.semantic.as_str()))
            .collect::<std::result::Result<Vec<CString>, _>>()
            .map_err(|e| Error::Device(format!("invalid semantic name: {}", e)))?;
        let input_elements: Vec<D3D12_INPUT_ELEMENT_DESC> = info
            .input_layout
            .iter()
            .zip(semantics.iter())
            .map(|(element, semantic)| D3D12_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(semantic.as_ptr() as *const u8),
                SemanticIndex: element.index,
                Format: to_dxgi_format(element.format),
                InputSlot: element.input_slot,
                AlignedByteOffset: element.aligned_byte_offset,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            })
            .collect();

        let mut rtv_formats = [DXGI_FORMAT_UNKNOWN; 8];
        rtv_formats[0] = to_dxgi_format(info.render_target_format);

        let mut blend_targets = [D3D12_RENDER_TARGET_BLEND_DESC::default(); 8];
        blend_targets[0] = D3D12_RENDER_TARGET_BLEND_DESC {
            BlendEnable: false.into(),
            LogicOpEnable: false.into(),
            SrcBlend: D3D12_BLEND_ONE,
            DestBlend: D3D12_BLEND_ZERO,
            BlendOp: D3D12_BLEND_OP_ADD,
            SrcBlendAlpha: D3D12_BLEND_ONE,
            DestBlendAlpha: D3D12_BLEND_ZERO,
            BlendOpAlpha: D3D12_BLEND_OP_ADD,
            LogicOp: D3D12_LOGIC_OP_NOOP,
            RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };

        let desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: unsafe { std::mem::transmute_copy(&root_signature) },
            VS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: unsafe { vs.blob.GetBufferPointer() },
                BytecodeLength: unsafe { vs.blob.GetBufferSize() },
            },
            PS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: unsafe { fs.blob.GetBufferPointer() },
                BytecodeLength: unsafe { fs.blob.GetBufferSize() },
            },
            BlendState: D3D12_BLEND_DESC {
                AlphaToCoverageEnable: false.into(),
                IndependentBlendEnable: false.into(),
                RenderTarget: blend_targets,
            },
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                CullMode: D3D12_CULL_MODE_BACK,
                DepthClipEnable: true.into(),
                ..Default::default()
            },
            DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: info.depth_test.into(),
                DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
                DepthFunc: D3D12_COMPARISON_FUNC_LESS,
                StencilEnable: false.into(),
                ..Default::default()
            },
            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_elements.as_ptr(),
                NumElements: input_elements.len() as u32,
            },
            PrimitiveTopologyType: to_d3d12_topology_type(info.topology),
            NumRenderTargets: 1,
            RTVFormats: rtv_formats,
            DSVFormat: to_dxgi_format(info.depth_stencil_format),
            SampleMask: u32::MAX,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            ..Default::default()
        };

        let pso = unsafe { self.device.CreateGraphicsPipelineState(&desc)? };
        Ok(RenderPipeline { pso, root_signature })
    }

    fn create_render_target_view(
        &self,
        texture: &Texture,
        handle: CpuDescriptorHandle,
    ) -> Result<()> {
        unsafe {
            self.device
                .CreateRenderTargetView(&texture.resource, None, cpu_handle(handle));
        }
        Ok(())
    }

    fn create_depth_stencil_view(
        &self,
        texture: &Texture,
        format: Format,
        handle: CpuDescriptorHandle,
    ) -> Result<()> {
        if !format.is_depth() {
            return Err(Error::Validation(format!("{:?} is not a depth stencil format", format)));
        }
        let desc = D3D12_DEPTH_STENCIL_VIEW_DESC {
            Format: to_dxgi_format(format),
            ViewDimension: D3D12_DSV_DIMENSION_TEXTURE2D,
            Flags: D3D12_DSV_FLAG_NONE,
            Anonymous: D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_DSV { MipSlice: 0 },
            },
        };
        unsafe {
            self.device
                .CreateDepthStencilView(&texture.resource, Some(&desc), cpu_handle(handle));
        }
        Ok(())
    }

    fn create_constant_buffer_view(
        &self,
        buffer: &Buffer,
        handle: CpuDescriptorHandle,
    ) -> Result<()> {
        if buffer.size % 256 != 0 {
            return Err(Error::Validation(format!(
                "constant buffer size {} is not 256 byte aligned",
                buffer.size
            )));
        }
        unsafe {
            let desc = D3D12_CONSTANT_BUFFER_VIEW_DESC {
                BufferLocation: buffer.resource.GetGPUVirtualAddress(),
                SizeInBytes: buffer.size as u32,
            };
            self.device.CreateConstantBufferView(Some(&desc), cpu_handle(handle));
        }
        Ok(())
    }

    fn execute(&self, cmd: &CmdBuf) -> Result<()> {
        if !cmd.closed {
            return Err(Error::Validation(String::from(
                "executing a command list which is not closed",
            )));
        }
        unsafe {
            let list: ID3D12CommandList = cmd.cmd.cast()?;
            self.command_queue.ExecuteCommandLists(&[Some(list)]);
        }
        Ok(())
    }

    fn signal(&self, fence: &Fence, value: u64) -> Result<()> {
        unsafe {
            self.command_queue.Signal(&fence.fence, value)?;
        }
        Ok(())
    }
}

impl super::SwapChain<Device> for SwapChain {
    fn get_num_buffers(&self) -> u32 {
        self.num_buffers
    }

    fn get_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn get_buffer(&self, index: u32) -> Result<Texture> {
        unsafe {
            let resource: ID3D12Resource = self.swap_chain.GetBuffer(index)?;
            let desc = resource.GetDesc();
            Ok(Texture {
                resource,
                width: desc.Width,
                height: desc.Height as u64,
                format: self.format,
            })
        }
    }

    fn resize_buffers(
        &mut self,
        num_buffers: u32,
        width: u32,
        height: u32,
        format: Format,
    ) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::Gpu(format!("invalid swap chain size {}x{}", width, height)));
        }
        unsafe {
            self.swap_chain.ResizeBuffers(
                num_buffers,
                width,
                height,
                to_dxgi_format(format),
                DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
            )?;
        }
        self.num_buffers = num_buffers;
        self.width = width;
        self.height = height;
        self.format = format;
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        unsafe {
            self.swap_chain.Present(sync_interval, DXGI_PRESENT(0)).ok()?;
        }
        Ok(())
    }
}

impl super::CmdAllocator<Device> for CmdAllocator {
    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.allocator.Reset()?;
        }
        Ok(())
    }
}

impl super::CmdBuf<Device> for CmdBuf {
    fn reset(&mut self, allocator: &CmdAllocator, pipeline: Option<&RenderPipeline>) -> Result<()> {
        if !self.closed {
            return Err(Error::Validation(String::from(
                "reset of a command list which is still recording",
            )));
        }
        unsafe {
            match pipeline {
                Some(pipeline) => {
                    self.cmd.Reset(&allocator.allocator, &pipeline.pso)?;
                    self.cmd.SetGraphicsRootSignature(&pipeline.root_signature);
                }
                None => self.cmd.Reset(&allocator.allocator, None)?,
            }
        }
        self.closed = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Validation(String::from(
                "close of a command list which is already closed",
            )));
        }
        self.closed = true;
        unsafe {
            self.cmd.Close()?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn transition_barrier(&mut self, barrier: &TransitionBarrier<Device>) {
        let resource = match (barrier.texture, barrier.buffer) {
            (Some(texture), None) => &texture.resource,
            (None, Some(buffer)) => &buffer.resource,
            _ => {
                tracing::error!("transition barrier requires exactly one resource");
                return;
            }
        };
        let barrier = transition_barrier(
            resource,
            to_d3d12_resource_state(barrier.state_before),
            to_d3d12_resource_state(barrier.state_after),
        );
        unsafe {
            self.cmd.ResourceBarrier(&[barrier]);
        }
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        let vp = D3D12_VIEWPORT {
            TopLeftX: viewport.x,
            TopLeftY: viewport.y,
            Width: viewport.width,
            Height: viewport.height,
            MinDepth: viewport.min_depth,
            MaxDepth: viewport.max_depth,
        };
        unsafe {
            self.cmd.RSSetViewports(&[vp]);
        }
    }

    fn set_scissor_rect(&mut self, scissor_rect: &ScissorRect) {
        let rect = RECT {
            left: scissor_rect.left,
            top: scissor_rect.top,
            right: scissor_rect.right,
            bottom: scissor_rect.bottom,
        };
        unsafe {
            self.cmd.RSSetScissorRects(&[rect]);
        }
    }

    fn clear_render_target(&mut self, rtv: CpuDescriptorHandle, colour: ClearColour) {
        unsafe {
            self.cmd
                .ClearRenderTargetView(cpu_handle(rtv), &colour.as_array(), None);
        }
    }

    fn clear_depth_stencil(
        &mut self,
        dsv: CpuDescriptorHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) {
        let mut d3d12_flags = D3D12_CLEAR_FLAGS(0);
        if flags.contains(ClearFlags::DEPTH) {
            d3d12_flags |= D3D12_CLEAR_FLAG_DEPTH;
        }
        if flags.contains(ClearFlags::STENCIL) {
            d3d12_flags |= D3D12_CLEAR_FLAG_STENCIL;
        }
        unsafe {
            self.cmd
                .ClearDepthStencilView(cpu_handle(dsv), d3d12_flags, depth, stencil, &[]);
        }
    }

    fn set_render_targets(&mut self, rtv: CpuDescriptorHandle, dsv: Option<CpuDescriptorHandle>) {
        let rtv = cpu_handle(rtv);
        unsafe {
            match dsv {
                Some(dsv) => {
                    let dsv = cpu_handle(dsv);
                    self.cmd.OMSetRenderTargets(1, Some(&rtv), false, Some(&dsv));
                }
                None => self.cmd.OMSetRenderTargets(1, Some(&rtv), false, None),
            }
        }
    }

    fn set_heap(&mut self, heap: &Heap) {
        unsafe {
            self.cmd.SetDescriptorHeaps(&[Some(heap.heap.clone())]);
        }
    }

    fn set_render_pipeline(&mut self, pipeline: &RenderPipeline) {
        unsafe {
            self.cmd.SetPipelineState(&pipeline.pso);
            self.cmd.SetGraphicsRootSignature(&pipeline.root_signature);
        }
    }

    fn set_render_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle) {
        unsafe {
            self.cmd.SetGraphicsRootDescriptorTable(
                slot,
                D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.ptr },
            );
        }
    }

    fn set_vertex_buffer(&mut self, buffer: &Buffer, slot: u32) {
        match &buffer.vbv {
            Some(vbv) => unsafe {
                self.cmd.IASetVertexBuffers(slot, Some(&[*vbv]));
            },
            None => tracing::error!("buffer bound as a vertex buffer has no vertex buffer view"),
        }
    }

    fn set_index_buffer(&mut self, buffer: &Buffer) {
        match &buffer.ibv {
            Some(ibv) => unsafe {
                self.cmd.IASetIndexBuffer(Some(ibv));
            },
            None => tracing::error!("buffer bound as an index buffer has no index buffer view"),
        }
    }

    fn set_topology(&mut self, topology: Topology) {
        unsafe {
            self.cmd.IASetPrimitiveTopology(to_d3d12_topology(topology));
        }
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        unsafe {
            self.cmd.DrawIndexedInstanced(
                index_count,
                instance_count,
                start_index,
                base_vertex,
                start_instance,
            );
        }
    }
}

impl super::Fence<Device> for Fence {
    fn get_completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn set_event_on_completion(&self, value: u64, event: &Event) -> Result<()> {
        unsafe {
            self.fence
                .SetEventOnCompletion(value, event.handle)
                .map_err(|e| {
                    Error::Sync(format!("SetEventOnCompletion({}) failed: {}", value, e.message()))
                })
        }
    }
}

impl super::Event<Device> for Event {
    fn wait(&self) -> Result<()> {
        let result = unsafe { WaitForSingleObject(self.handle, INFINITE) };
        if result != WAIT_OBJECT_0 {
            return Err(Error::Sync(format!("WaitForSingleObject returned {:?}", result)));
        }
        Ok(())
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

impl super::Heap<Device> for Heap {
    fn get_heap_type(&self) -> HeapType {
        self.heap_type
    }

    fn get_capacity(&self) -> usize {
        self.capacity
    }

    fn get_cpu_handle_start(&self) -> CpuDescriptorHandle {
        unsafe {
            CpuDescriptorHandle {
                ptr: self.heap.GetCPUDescriptorHandleForHeapStart().ptr,
            }
        }
    }

    fn get_gpu_handle_start(&self) -> Option<GpuDescriptorHandle> {
        if !self.heap_type.is_shader_visible() {
            return None;
        }
        unsafe {
            Some(GpuDescriptorHandle {
                ptr: self.heap.GetGPUDescriptorHandleForHeapStart().ptr,
            })
        }
    }
}

impl super::Texture<Device> for Texture {
    fn get_id(&self) -> u64 {
        self.resource.as_raw() as u64
    }

    fn get_size(&self) -> (u64, u64) {
        (self.width, self.height)
    }

    fn get_format(&self) -> Format {
        self.format
    }
}

impl super::Buffer<Device> for Buffer {
    fn get_size(&self) -> usize {
        self.size
    }

    fn update<T: Sized>(&mut self, offset: usize, data: &[T]) -> Result<()> {
        let bytes = super::slice_as_u8_slice(data);
        if offset + bytes.len() > self.size {
            return Err(Error::Gpu(format!(
                "buffer update of {} bytes at {} exceeds buffer size {}",
                bytes.len(),
                offset,
                self.size
            )));
        }
        write_mapped(&self.resource, offset, bytes)
    }
}

impl super::Shader<Device> for Shader {}

impl super::RenderPipeline<Device> for RenderPipeline {}

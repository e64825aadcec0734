use crate::config::RenderConfig;
use crate::gfx::{
    self, Buffer, BufferInfo, BufferUsage, Format, InputElementInfo, RenderPipelineInfo,
    ResourceState, ShaderCompileInfo, ShaderInfo, ShaderType, Topology,
};
use crate::heaps::DescriptorHeaps;
use crate::os::MouseButtons;
use crate::{setup_err, Result};

use maths_rs::num::*;
use maths_rs::*;
use maths_rs::{Mat4f, Vec3f, Vec4f};

/// Built in cube shader, entry points `VSMain` and `PSMain`.
pub const CUBE_SHADER_SOURCE: &str = include_str!("../shaders/cube.hlsl");

/// Position and colour, 28 bytes per vertex.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub colour: [f32; 4],
}

const fn vertex(position: [f32; 3], colour: [f32; 4]) -> Vertex {
    Vertex { position, colour }
}

pub const CUBE_VERTICES: [Vertex; 8] = [
    vertex([-1.0, -1.0, -1.0], [0.0, 0.0, 0.0, 1.0]),
    vertex([-1.0, 1.0, -1.0], [0.0, 1.0, 0.0, 1.0]),
    vertex([1.0, 1.0, -1.0], [1.0, 1.0, 0.0, 1.0]),
    vertex([1.0, -1.0, -1.0], [1.0, 0.0, 0.0, 1.0]),
    vertex([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0, 1.0]),
    vertex([-1.0, 1.0, 1.0], [0.0, 1.0, 1.0, 1.0]),
    vertex([1.0, 1.0, 1.0], [1.0, 1.0, 1.0, 1.0]),
    vertex([1.0, -1.0, 1.0], [1.0, 0.0, 1.0, 1.0]),
];

#[rustfmt::skip]
pub const CUBE_INDICES: [u16; 36] = [
    0, 1, 2, 0, 2, 3, // front
    4, 6, 5, 4, 7, 6, // back
    4, 5, 1, 4, 1, 0, // left
    3, 2, 6, 3, 6, 7, // right
    1, 5, 6, 1, 6, 2, // top
    4, 0, 3, 4, 3, 7, // bottom
];

const NEAR: f32 = 1.0;
const FAR: f32 = 1000.0;
const PHI_MIN: f32 = 0.1;
const PHI_MAX: f32 = std::f32::consts::PI - 0.1;

/// Left handed look at, for column vectors (`m * v`).
pub fn create_look_at_matrix_lh(eye: Vec3f, target: Vec3f, up: Vec3f) -> Mat4f {
    let z = normalize(target - eye);
    let x = normalize(cross(up, z));
    let y = cross(z, x);
    Mat4f::from((
        Vec4f::new(x.x, x.y, x.z, -dot(x, eye)),
        Vec4f::new(y.x, y.y, y.z, -dot(y, eye)),
        Vec4f::new(z.x, z.y, z.z, -dot(z, eye)),
        Vec4f::new(0.0, 0.0, 0.0, 1.0),
    ))
}

/// Left handed perspective projection mapping depth `near..far` to `0..1`.
pub fn create_perspective_projection_lh(fov: f32, aspect: f32, near: f32, far: f32) -> Mat4f {
    let h = 1.0 / f32::tan(fov * 0.5);
    let w = h / aspect;
    let range = far / (far - near);
    Mat4f::from((
        Vec4f::new(w, 0.0, 0.0, 0.0),
        Vec4f::new(0.0, h, 0.0, 0.0),
        Vec4f::new(0.0, 0.0, range, -range * near),
        Vec4f::new(0.0, 0.0, 1.0, 0.0),
    ))
}

pub fn identity() -> Mat4f {
    Mat4f::from((
        Vec4f::new(1.0, 0.0, 0.0, 0.0),
        Vec4f::new(0.0, 1.0, 0.0, 0.0),
        Vec4f::new(0.0, 0.0, 1.0, 0.0),
        Vec4f::new(0.0, 0.0, 0.0, 1.0),
    ))
}

/// Camera orbiting the origin in spherical coordinates, dragged with the left mouse button.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
    pub fov_degrees: f32,
    previous_mouse: (f32, f32),
}

impl OrbitCamera {
    pub fn new(fov_degrees: f32) -> Self {
        OrbitCamera {
            radius: 5.0,
            phi: 1.2,
            theta: 4.0,
            fov_degrees,
            previous_mouse: (0.0, 0.0),
        }
    }

    /// 0.25 degrees of rotation per pixel while the left button is held.
    pub fn mouse_moved(&mut self, x: i32, y: i32, buttons: MouseButtons) {
        let (x, y) = (x as f32, y as f32);
        if buttons.contains(MouseButtons::LEFT) {
            let dx = f32::deg_to_rad(0.25 * (x - self.previous_mouse.0));
            let dy = f32::deg_to_rad(0.25 * (y - self.previous_mouse.1));
            self.theta -= dx;
            self.phi = (self.phi - dy).clamp(PHI_MIN, PHI_MAX);
        }
        self.previous_mouse = (x, y);
    }

    pub fn eye(&self) -> Vec3f {
        Vec3f::new(
            self.radius * f32::sin(self.phi) * f32::cos(self.theta),
            self.radius * f32::cos(self.phi),
            self.radius * f32::sin(self.phi) * f32::sin(self.theta),
        )
    }

    pub fn view_matrix(&self) -> Mat4f {
        create_look_at_matrix_lh(self.eye(), Vec3f::new(0.0, 0.0, 0.0), Vec3f::new(0.0, 1.0, 0.0))
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4f {
        create_perspective_projection_lh(f32::deg_to_rad(self.fov_degrees), aspect, NEAR, FAR)
    }

    /// `projection * view * world`, laid out for a `row_major` hlsl matrix.
    pub fn mvp(&self, world: Mat4f, aspect: f32) -> Mat4f {
        self.projection_matrix(aspect) * self.view_matrix() * world
    }
}

/// Geometry, constants and pipeline for the cube.
pub struct SceneResources<D: gfx::Device> {
    pipeline: D::RenderPipeline,
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    constant_buffer: D::Buffer,
    _vs: D::Shader,
    _fs: D::Shader,
}

fn compile_info(entry_point: &str, target: &str) -> Option<ShaderCompileInfo> {
    Some(ShaderCompileInfo {
        entry_point: entry_point.to_string(),
        target: target.to_string(),
        debug: cfg!(debug_assertions),
    })
}

impl<D: gfx::Device> SceneResources<D> {
    /// Compile shaders, create the pipeline and upload buffers. The constant buffer view is
    /// written into the single slot of the shader visible heap.
    pub fn create(device: &D, heaps: &DescriptorHeaps<D>, config: &RenderConfig) -> Result<Self> {
        let source = match &config.shader_path {
            Some(path) => std::fs::read_to_string(path)?,
            None => CUBE_SHADER_SOURCE.to_string(),
        };

        let vs = device
            .create_shader(
                &ShaderInfo {
                    shader_type: ShaderType::Vertex,
                    compile_info: compile_info("VSMain", "vs_5_0"),
                },
                source.as_bytes(),
            )
            .map_err(setup_err("compile vertex shader"))?;
        let fs = device
            .create_shader(
                &ShaderInfo {
                    shader_type: ShaderType::Fragment,
                    compile_info: compile_info("PSMain", "ps_5_0"),
                },
                source.as_bytes(),
            )
            .map_err(setup_err("compile pixel shader"))?;

        let pipeline = device
            .create_render_pipeline(&RenderPipelineInfo {
                vs: Some(&vs),
                fs: Some(&fs),
                input_layout: vec![
                    InputElementInfo {
                        semantic: String::from("POSITION"),
                        index: 0,
                        format: Format::RGB32f,
                        input_slot: 0,
                        aligned_byte_offset: 0,
                    },
                    InputElementInfo {
                        semantic: String::from("COLOR"),
                        index: 0,
                        format: Format::RGBA32f,
                        input_slot: 0,
                        aligned_byte_offset: 12,
                    },
                ],
                num_constant_buffers: 1,
                topology: Topology::TriangleList,
                render_target_format: config.back_buffer_format,
                depth_stencil_format: config.depth_stencil_format,
                depth_test: true,
            })
            .map_err(setup_err("create render pipeline"))?;

        let vertex_buffer = device
            .create_buffer(
                &BufferInfo {
                    usage: BufferUsage::Vertex,
                    format: Format::Unknown,
                    stride: std::mem::size_of::<Vertex>(),
                    num_elements: CUBE_VERTICES.len(),
                    initial_state: ResourceState::GenericRead,
                },
                Some(gfx::slice_as_u8_slice(&CUBE_VERTICES)),
            )
            .map_err(setup_err("create vertex buffer"))?;

        let index_buffer = device
            .create_buffer(
                &BufferInfo {
                    usage: BufferUsage::Index,
                    format: Format::R16u,
                    stride: std::mem::size_of::<u16>(),
                    num_elements: CUBE_INDICES.len(),
                    initial_state: ResourceState::GenericRead,
                },
                Some(gfx::slice_as_u8_slice(&CUBE_INDICES)),
            )
            .map_err(setup_err("create index buffer"))?;

        let constants = identity();
        let constant_buffer = device
            .create_buffer(
                &BufferInfo {
                    usage: BufferUsage::ConstantBuffer,
                    format: Format::Unknown,
                    stride: std::mem::size_of::<Mat4f>(),
                    num_elements: 1,
                    initial_state: ResourceState::GenericRead,
                },
                Some(gfx::as_u8_slice(&constants)),
            )
            .map_err(setup_err("create constant buffer"))?;
        device
            .create_constant_buffer_view(&constant_buffer, heaps.cbv_cpu_handle())
            .map_err(setup_err("create constant buffer view"))?;

        Ok(SceneResources {
            pipeline,
            vertex_buffer,
            index_buffer,
            constant_buffer,
            _vs: vs,
            _fs: fs,
        })
    }

    /// Write the model view projection matrix consumed by the next recorded frame.
    pub fn update(&mut self, mvp: &Mat4f) -> Result<()> {
        self.constant_buffer.update(0, std::slice::from_ref(mvp))
    }

    pub fn pipeline(&self) -> &D::RenderPipeline {
        &self.pipeline
    }

    pub fn vertex_buffer(&self) -> &D::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &D::Buffer {
        &self.index_buffer
    }

    pub fn constant_buffer(&self) -> &D::Buffer {
        &self.constant_buffer
    }

    pub fn index_count(&self) -> u32 {
        CUBE_INDICES.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 28);
        assert!(CUBE_INDICES.iter().all(|&i| (i as usize) < CUBE_VERTICES.len()));
    }

    #[test]
    fn phi_is_clamped() {
        let mut camera = OrbitCamera::new(45.0);
        camera.mouse_moved(0, 0, MouseButtons::NONE);
        camera.mouse_moved(0, -100000, MouseButtons::LEFT);
        assert!((camera.phi - PHI_MAX).abs() < 1e-5);
        camera.mouse_moved(0, 100000, MouseButtons::LEFT);
        assert!((camera.phi - PHI_MIN).abs() < 1e-5);
    }

    #[test]
    fn drag_without_left_button_only_tracks_position() {
        let mut camera = OrbitCamera::new(45.0);
        camera.mouse_moved(100, 100, MouseButtons::RIGHT);
        assert_eq!(camera.theta, 4.0);
        assert_eq!(camera.phi, 1.2);
        // 40 pixels at 0.25 degrees per pixel
        camera.mouse_moved(140, 100, MouseButtons::LEFT);
        assert!((camera.theta - (4.0 - 10.0f32.to_radians())).abs() < 1e-5);
    }

    #[test]
    fn origin_projects_inside_the_depth_range() {
        let camera = OrbitCamera::new(45.0);
        let mvp = camera.mvp(identity(), 1280.0 / 720.0);
        let clip = mvp * Vec4f::new(0.0, 0.0, 0.0, 1.0);
        // the eye is `radius` away from the origin
        assert!((clip.w - camera.radius).abs() < 1e-4);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
        assert!((clip.x / clip.w).abs() < 1e-4);
        assert!((clip.y / clip.w).abs() < 1e-4);
    }
}

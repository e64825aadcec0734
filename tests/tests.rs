use dxframe_rs::gfx::null::{self, Command, TraceEvent};
use dxframe_rs::os::null as null_os;
use dxframe_rs::os::{AppInfo, MouseButtons, PumpStatus, Rect, WindowEvent, WindowInfo};
use dxframe_rs::prelude::*;
use dxframe_rs::scene;

use gfx::{ClearFlags, ResourceState, ScissorRect, Topology, Viewport};
use std::time::Duration;

type NullContext = Context<null::Device, null_os::App>;

fn create_app() -> null_os::App {
    null_os::App::create(AppInfo {
        name: String::from("dxframe_tests"),
        dpi_aware: false,
    })
    .unwrap()
}

fn create_context(app: &mut null_os::App, config: RenderConfig) -> NullContext {
    Context::create(app, config).unwrap()
}

fn create_context_with_latency(
    app: &mut null_os::App,
    config: RenderConfig,
    latency: Duration,
) -> NullContext {
    let device = null::Device::create_with_latency(&config.device_info(), latency).unwrap();
    Context::create_with_device(app, device, config).unwrap()
}

/// Engine parts without a context, so frame steps can be driven one at a time.
struct Parts {
    _app: null_os::App,
    _window: null_os::Window,
    config: RenderConfig,
    scene: SceneResources<null::Device>,
    surfaces: SwapChainManager<null::Device>,
    gpu: GpuCore<null::Device>,
}

fn create_parts(latency: Duration) -> Parts {
    let mut app = create_app();
    let window = app.create_window(WindowInfo::default()).unwrap();
    let config = RenderConfig::default();
    let device = null::Device::create_with_latency(&config.device_info(), latency).unwrap();
    let mut gpu = GpuCore::from_device(device, config.buffer_count).unwrap();
    let surfaces =
        SwapChainManager::initialize::<null_os::App>(&mut gpu, &window, &config).unwrap();
    let scene = SceneResources::create(&gpu.device, &gpu.heaps, &config).unwrap();
    Parts {
        _app: app,
        _window: window,
        config,
        scene,
        surfaces,
        gpu,
    }
}

fn back_buffer_ids(ctx: &NullContext) -> Vec<u64> {
    ctx.surfaces().back_buffers().iter().map(|b| b.get_id()).collect()
}

fn depth_id(ctx: &NullContext) -> u64 {
    ctx.surfaces().depth_stencil().unwrap().get_id()
}

fn cycle_back_buffers(buffer_count: u32) {
    let mut app = create_app();
    let mut ctx = create_context(
        &mut app,
        RenderConfig {
            buffer_count,
            ..Default::default()
        },
    );

    let num_frames = buffer_count * 3;
    let mut indices = Vec::new();
    for _ in 0..num_frames {
        indices.push(ctx.surfaces().current_buffer_index());
        let before = ctx.gpu().sync.target_value();
        ctx.render().unwrap();
        assert_eq!(ctx.gpu().sync.target_value(), before + 1);
        assert_eq!(ctx.gpu().sync.completed_value(), before + 1);
        assert_eq!(ctx.frame().state(), FrameState::Idle);
    }

    let expected: Vec<u32> = (0..num_frames).map(|i| i % buffer_count).collect();
    assert_eq!(indices, expected);
    assert_eq!(ctx.surfaces().swap_chain().get_present_history(), expected.as_slice());
    assert_eq!(ctx.frame().frame_count(), num_frames as u64);
    ctx.shutdown().unwrap();
}

#[test]
fn double_buffered_frames_alternate() {
    cycle_back_buffers(2);
}

#[test]
fn triple_buffered_frames_cycle() {
    cycle_back_buffers(3);
}

#[test]
fn init_builds_views_and_depth() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());

    let surfaces = ctx.surfaces();
    assert_eq!(surfaces.size(), (1280, 720));
    assert_eq!(surfaces.buffer_count(), 2);
    assert_eq!(surfaces.current_buffer_index(), 0);
    assert_eq!(surfaces.viewport(), Viewport::from_extent(1280, 720));
    assert_eq!(
        surfaces.scissor_rect(),
        ScissorRect {
            left: 0,
            top: 0,
            right: 1280,
            bottom: 720
        }
    );

    for buffer in surfaces.back_buffers() {
        assert_eq!(buffer.get_size(), (1280, 720));
        assert_eq!(buffer.get_state(), ResourceState::Present);
    }
    let depth = surfaces.depth_stencil().unwrap();
    assert_eq!(depth.get_size(), (1280, 720));
    assert_eq!(depth.get_format(), gfx::Format::D24nS8u);
    assert_eq!(depth.get_state(), ResourceState::DepthWrite);

    let heaps = &ctx.gpu().heaps;
    assert_eq!(heaps.rtv_heap().get_live_view_count(), 2);
    assert_eq!(heaps.dsv_heap().get_live_view_count(), 1);
    assert_eq!(heaps.cbv_heap().get_live_view_count(), 1);
    for (i, buffer) in surfaces.back_buffers().iter().enumerate() {
        assert_eq!(heaps.rtv_heap().get_view_resource(i), Some(buffer.get_id()));
    }

    assert_eq!(ctx.frame().state(), FrameState::Idle);
    assert!(ctx.window().is_visible());
    assert_eq!(
        ctx.window().get_viewport_rect(),
        Rect {
            x: 0,
            y: 0,
            width: 1280,
            height: 720
        }
    );
    assert_eq!(ctx.window().get_title(), "DirectX Demo");
    assert_eq!(ctx.gpu().device.get_in_flight(), 0);
    ctx.shutdown().unwrap();
}

#[test]
fn frame_records_draw_in_order() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());
    ctx.render().unwrap();

    let back_buffer = ctx.surfaces().back_buffers()[0].get_id();
    let commands = ctx.gpu().cmd.get_commands();
    assert!(ctx.gpu().cmd.is_closed());

    // reset with the pipeline, then the recorded frame
    assert!(matches!(commands[0], Command::SetPipeline { .. }));
    assert_eq!(commands[1], Command::SetViewport(Viewport::from_extent(1280, 720)));
    assert!(matches!(commands[2], Command::SetScissorRect(_)));
    assert_eq!(
        commands[3],
        Command::Barrier {
            resource: back_buffer,
            before: ResourceState::Present,
            after: ResourceState::RenderTarget
        }
    );
    assert_eq!(
        commands[4],
        Command::ClearRenderTarget {
            rtv: ctx.gpu().heaps.rtv_handle(0).unwrap(),
            colour: [0.2, 0.4, 0.6, 1.0]
        }
    );
    assert_eq!(
        commands[5],
        Command::ClearDepthStencil {
            dsv: ctx.gpu().heaps.dsv_handle(),
            flags: ClearFlags::DEPTH | ClearFlags::STENCIL,
            depth: 1.0,
            stencil: 0
        }
    );
    assert!(matches!(commands[6], Command::SetRenderTargets { dsv: Some(_), .. }));
    assert!(matches!(commands[7], Command::SetHeap { .. }));
    assert!(matches!(commands[8], Command::SetPipeline { .. }));
    assert_eq!(
        commands[9],
        Command::SetDescriptorTable {
            slot: 0,
            handle: ctx.gpu().heaps.cbv_gpu_handle().unwrap()
        }
    );
    assert!(matches!(commands[10], Command::SetVertexBuffer { slot: 0, .. }));
    assert!(matches!(commands[11], Command::SetIndexBuffer { .. }));
    assert_eq!(commands[12], Command::SetTopology(Topology::TriangleList));
    assert_eq!(
        commands[13],
        Command::DrawIndexed {
            index_count: 36,
            instance_count: 1,
            start_index: 0,
            base_vertex: 0,
            start_instance: 0
        }
    );
    assert_eq!(
        commands[14],
        Command::Barrier {
            resource: back_buffer,
            before: ResourceState::RenderTarget,
            after: ResourceState::Present
        }
    );
    assert_eq!(commands.len(), 15);
    ctx.shutdown().unwrap();
}

#[test]
fn fence_completion_is_monotonic_under_latency() {
    let device =
        null::Device::create_with_latency(&gfx::DeviceInfo::default(), Duration::from_millis(2))
            .unwrap();
    let mut gpu = GpuCore::from_device(device, 2).unwrap();

    let mut last = gpu.sync.completed_value();
    for _ in 0..8 {
        gpu.begin_recording(None).unwrap();
        gpu.submit().unwrap();
        let value = gpu.sync.request_signal(&gpu.device).unwrap();
        assert!(value > last);
        loop {
            let completed = gpu.sync.completed_value();
            assert!(completed >= last);
            last = completed;
            if completed >= value {
                break;
            }
            std::thread::yield_now();
        }
        gpu.sync.wait_until(value).unwrap();
    }

    // values beyond the last signal can never complete
    let target = gpu.sync.target_value();
    assert!(matches!(gpu.sync.wait_until(target + 1), Err(Error::Sync(_))));
}

#[test]
fn allocator_reset_only_after_gpu_completion() {
    let mut app = create_app();
    let mut ctx =
        create_context_with_latency(&mut app, RenderConfig::default(), Duration::from_millis(3));
    for _ in 0..3 {
        ctx.render().unwrap();
    }
    ctx.shutdown().unwrap();

    let trace = ctx.gpu().device.get_trace();
    let mut executed = 0;
    let mut completed = 0;
    let mut signalled = 0;
    let mut fence = 0;
    let mut resets = 0;
    for event in &trace {
        match event {
            TraceEvent::Execute { .. } => executed += 1,
            TraceEvent::GpuExecuted { .. } => completed += 1,
            TraceEvent::Signal { value } => signalled = *value,
            TraceEvent::FenceCompleted { value } => fence = *value,
            TraceEvent::AllocatorReset { .. } => {
                assert_eq!(executed, completed, "allocator reset with command lists in flight");
                assert_eq!(signalled, fence, "allocator reset before the last signal completed");
                resets += 1;
            }
            _ => (),
        }
    }
    // one reset for the initial rebuild plus one per frame
    assert_eq!(resets, 4);
    assert!(trace.iter().any(|e| matches!(e, TraceEvent::WaitReturned { .. })));
}

#[test]
fn degenerate_resize_is_ignored() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());

    let buffers = back_buffer_ids(&ctx);
    let depth = depth_id(&ctx);
    let target = ctx.gpu().sync.target_value();

    for (width, height) in [(0, 0), (0, 600), (-5, 10), (640, -1)] {
        app.push_event(WindowEvent::Resize { width, height });
        assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Dispatched);
        assert_eq!(back_buffer_ids(&ctx), buffers);
        assert_eq!(depth_id(&ctx), depth);
        assert_eq!(ctx.surfaces().size(), (1280, 720));
        assert_eq!(ctx.gpu().sync.target_value(), target);
    }

    // a minimised window still renders into the existing buffers
    ctx.render().unwrap();
    assert!(!ctx
        .gpu()
        .device
        .get_trace()
        .iter()
        .any(|e| matches!(e, TraceEvent::ResizeBuffers { width: 0, .. })));
    ctx.shutdown().unwrap();
}

#[test]
fn resize_reallocates_depth_and_resets_index() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());
    ctx.render().unwrap();
    assert_eq!(ctx.surfaces().current_buffer_index(), 1);

    let old_depth = depth_id(&ctx);
    let old_buffers = back_buffer_ids(&ctx);

    app.push_event(WindowEvent::Resize {
        width: 1920,
        height: 1080,
    });
    assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Dispatched);

    let device = &ctx.gpu().device;
    assert!(!device.is_resource_live(old_depth));
    for id in &old_buffers {
        assert!(!device.is_resource_live(*id));
    }

    let surfaces = ctx.surfaces();
    assert_eq!(surfaces.size(), (1920, 1080));
    assert_eq!(surfaces.current_buffer_index(), 0);
    assert_eq!(surfaces.swap_chain().get_current_backbuffer_index(), 0);
    assert_eq!(surfaces.viewport(), Viewport::from_extent(1920, 1080));
    assert_eq!(surfaces.scissor_rect(), ScissorRect::from_extent(1920, 1080));
    assert_eq!(surfaces.depth_stencil().unwrap().get_size(), (1920, 1080));
    assert_ne!(depth_id(&ctx), old_depth);
    for buffer in surfaces.back_buffers() {
        assert_eq!(buffer.get_size(), (1920, 1080));
    }
    assert_eq!(ctx.gpu().heaps.rtv_heap().get_live_view_count(), 2);
    assert_eq!(ctx.gpu().heaps.dsv_heap().get_live_view_count(), 1);
    assert!(device
        .get_trace()
        .contains(&TraceEvent::ResizeBuffers {
            width: 1920,
            height: 1080
        }));

    ctx.render().unwrap();
    assert_eq!(ctx.surfaces().current_buffer_index(), 1);
    ctx.shutdown().unwrap();
}

#[test]
fn render_while_recording_is_rejected() {
    let mut parts = create_parts(Duration::ZERO);
    let mut frame = FrameLoop::new(parts.config.clear_colour, parts.config.present_interval);

    frame.begin(&mut parts.gpu, &parts.scene).unwrap();
    assert_eq!(frame.state(), FrameState::Recording);
    assert!(matches!(
        frame.render(&mut parts.gpu, &mut parts.surfaces, &parts.scene),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(frame.present(&mut parts.surfaces), Err(Error::InvalidState(_))));
    assert!(matches!(frame.finish(&mut parts.gpu), Err(Error::InvalidState(_))));

    // the rejected calls left the in progress frame intact
    frame.record(&mut parts.gpu, &parts.surfaces, &parts.scene).unwrap();
    frame.submit(&mut parts.gpu).unwrap();
    frame.present(&mut parts.surfaces).unwrap();
    assert_eq!(frame.state(), FrameState::Presented);
    frame.finish(&mut parts.gpu).unwrap();
    assert_eq!(frame.state(), FrameState::Idle);
    assert_eq!(frame.frame_count(), 1);
}

#[test]
fn open_command_list_cannot_execute() {
    let mut parts = create_parts(Duration::ZERO);
    parts.gpu.begin_recording(None).unwrap();
    assert!(matches!(
        parts.gpu.device.execute(&parts.gpu.cmd),
        Err(Error::Validation(_))
    ));
    parts.gpu.submit().unwrap();
    parts.gpu.flush().unwrap();
}

#[test]
fn mismatched_barrier_fails_on_close() {
    let mut parts = create_parts(Duration::ZERO);
    parts.gpu.begin_recording(None).unwrap();
    let depth = parts.surfaces.depth_stencil().unwrap();
    parts.gpu.cmd.transition_barrier(&gfx::TransitionBarrier::<null::Device> {
        texture: Some(depth),
        buffer: None,
        state_before: ResourceState::Common,
        state_after: ResourceState::DepthRead,
    });
    assert!(matches!(parts.gpu.cmd.close(), Err(Error::Validation(_))));
    assert_eq!(depth.get_state(), ResourceState::DepthWrite);
}

#[test]
fn allocator_reset_while_in_flight_fails() {
    let mut parts = create_parts(Duration::from_millis(50));
    parts.gpu.begin_recording(None).unwrap();
    parts.gpu.submit().unwrap();
    assert!(matches!(parts.gpu.allocator.reset(), Err(Error::Validation(_))));
    parts.gpu.flush().unwrap();
    parts.gpu.allocator.reset().unwrap();
}

#[test]
fn resize_with_held_back_buffer_fails() {
    let mut parts = create_parts(Duration::ZERO);
    let held = parts.surfaces.back_buffers()[0].clone();
    assert!(matches!(
        parts.surfaces.rebuild_buffers(&mut parts.gpu, 800, 600),
        Err(Error::Validation(_))
    ));
    drop(held);
}

#[test]
fn rtv_handle_out_of_range_fails() {
    let parts = create_parts(Duration::ZERO);
    assert!(parts.gpu.heaps.rtv_handle(1).is_ok());
    assert!(matches!(parts.gpu.heaps.rtv_handle(2), Err(Error::Validation(_))));
}

#[test]
fn device_removed_present_is_fatal() {
    let mut parts = create_parts(Duration::ZERO);
    let mut frame = FrameLoop::new(parts.config.clear_colour, parts.config.present_interval);

    frame.begin(&mut parts.gpu, &parts.scene).unwrap();
    frame.record(&mut parts.gpu, &parts.surfaces, &parts.scene).unwrap();
    frame.submit(&mut parts.gpu).unwrap();

    parts.gpu.device.remove_device();
    assert!(matches!(frame.present(&mut parts.surfaces), Err(Error::Gpu(_))));
    assert_eq!(frame.state(), FrameState::Submitted);
    assert_eq!(parts.surfaces.current_buffer_index(), 0);

    // the loop is halted, no further frames are accepted
    assert!(matches!(
        frame.render(&mut parts.gpu, &mut parts.surfaces, &parts.scene),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(parts.gpu.flush(), Err(Error::Gpu(_))));
}

#[test]
fn failed_begin_halts_the_frame_loop() {
    let mut parts = create_parts(Duration::ZERO);
    let mut frame = FrameLoop::new(parts.config.clear_colour, parts.config.present_interval);

    // an open command list makes the allocator reset inside begin fail
    parts.gpu.begin_recording(None).unwrap();
    assert!(matches!(
        frame.render(&mut parts.gpu, &mut parts.surfaces, &parts.scene),
        Err(Error::Validation(_))
    ));
    assert_eq!(frame.state(), FrameState::Idle);
    assert!(frame.is_halted());

    assert!(matches!(
        frame.render(&mut parts.gpu, &mut parts.surfaces, &parts.scene),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(frame.begin(&mut parts.gpu, &parts.scene), Err(Error::InvalidState(_))));
    assert_eq!(frame.frame_count(), 0);

    parts.gpu.submit().unwrap();
    parts.gpu.flush().unwrap();
}

#[test]
fn resize_drains_in_flight_work() {
    let mut parts = create_parts(Duration::from_millis(20));
    parts.gpu.device.clear_trace();

    // submitted but never flushed
    parts.gpu.begin_recording(None).unwrap();
    parts.gpu.submit().unwrap();
    let drain_value = parts.gpu.sync.target_value() + 1;

    assert!(parts.surfaces.rebuild_buffers(&mut parts.gpu, 800, 600).unwrap());
    assert_eq!(parts.surfaces.size(), (800, 600));

    let trace = parts.gpu.device.get_trace();
    let position = |event: TraceEvent| trace.iter().position(|e| *e == event).unwrap();
    let executed = trace
        .iter()
        .position(|e| matches!(e, TraceEvent::GpuExecuted { .. }))
        .unwrap();
    let drained = position(TraceEvent::FenceCompleted { value: drain_value });
    let resized = position(TraceEvent::ResizeBuffers {
        width: 800,
        height: 600,
    });
    assert!(executed < drained);
    assert!(drained < resized);
}

#[test]
fn trace_keeps_most_recent_events() {
    let device = null::Device::create(&gfx::DeviceInfo::default()).unwrap();
    let mut gpu = GpuCore::from_device(device, 2).unwrap();
    for _ in 0..1000 {
        gpu.begin_recording(None).unwrap();
        gpu.submit().unwrap();
        gpu.flush().unwrap();
    }

    let trace = gpu.device.get_trace();
    assert_eq!(trace.len(), 4096);
    assert!(!trace.contains(&TraceEvent::Signal { value: 1 }));
    assert!(trace.contains(&TraceEvent::Signal {
        value: gpu.sync.target_value()
    }));
}

#[test]
fn device_removed_stops_context_frames() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());
    ctx.render().unwrap();

    ctx.gpu().device.remove_device();
    app.push_event(WindowEvent::Paint);
    assert!(matches!(app.pump(&mut ctx), Err(Error::Gpu(_))));
    assert_ne!(ctx.frame().state(), FrameState::Idle);
    assert!(matches!(ctx.render(), Err(Error::InvalidState(_))));
    assert_eq!(ctx.frame().frame_count(), 1);

    // a removed device cannot be flushed, shutdown reports it once
    assert!(ctx.shutdown().is_err());
    assert!(ctx.is_shut_down());
    assert!(ctx.shutdown().is_ok());
}

#[test]
fn event_registration_failure_is_sync_error() {
    let mut parts = create_parts(Duration::from_millis(100));
    parts.gpu.begin_recording(None).unwrap();
    parts.gpu.submit().unwrap();

    parts.gpu.device.set_fail_event_registration(true);
    let gpu = &mut parts.gpu;
    assert!(matches!(gpu.sync.signal_and_wait(&gpu.device), Err(Error::Sync(_))));

    gpu.device.set_fail_event_registration(false);
    let value = gpu.flush().unwrap();
    assert_eq!(gpu.sync.completed_value(), value);
}

#[test]
fn shutdown_flushes_outstanding_work() {
    let mut app = create_app();
    let mut ctx =
        create_context_with_latency(&mut app, RenderConfig::default(), Duration::from_millis(2));
    for _ in 0..4 {
        ctx.render().unwrap();
    }

    ctx.shutdown().unwrap();
    assert!(ctx.is_shut_down());
    let target = ctx.gpu().sync.target_value();
    assert_eq!(ctx.gpu().sync.completed_value(), target);
    assert_eq!(ctx.gpu().device.get_in_flight(), 0);

    // idempotent
    ctx.shutdown().unwrap();
    assert_eq!(ctx.gpu().sync.target_value(), target);
}

#[test]
fn paint_updates_constants_and_renders() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());

    assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Idle);

    app.push_event(WindowEvent::Paint);
    assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Dispatched);
    assert_eq!(ctx.frame().frame_count(), 1);

    let mvp = ctx.camera().mvp(scene::identity(), 1280.0 / 720.0);
    let expected = gfx::as_u8_slice(&mvp);
    let data = ctx.scene().constant_buffer().get_data();
    assert_eq!(&data[..expected.len()], expected);
    ctx.shutdown().unwrap();
}

#[test]
fn mouse_drag_orbits_camera() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());
    let theta = ctx.camera().theta;
    let phi = ctx.camera().phi;

    // moves without a button only track the cursor
    app.push_mouse_move(100, 100, MouseButtons::NONE);
    app.push_mouse_move(140, 120, MouseButtons::LEFT);
    assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Dispatched);

    let camera = ctx.camera();
    assert!((camera.theta - (theta - 10.0f32.to_radians())).abs() < 1e-5);
    assert!((camera.phi - (phi - 5.0f32.to_radians())).abs() < 1e-5);
    // each mouse move is followed by a render
    assert_eq!(ctx.frame().frame_count(), 2);
    ctx.shutdown().unwrap();
}

#[test]
fn close_quits_the_pump() {
    let mut app = create_app();
    let mut ctx = create_context(&mut app, RenderConfig::default());

    app.push_event(WindowEvent::Close);
    app.push_event(WindowEvent::Paint);
    assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Quit);
    assert_eq!(app.pending_events(), 0);
    assert_eq!(ctx.frame().frame_count(), 0);
    assert_eq!(app.pump(&mut ctx).unwrap(), PumpStatus::Quit);
    ctx.shutdown().unwrap();
}

#[test]
fn config_fields_default_when_missing() {
    let config: RenderConfig =
        serde_json::from_str(r#"{ "buffer_count": 3, "width": 800, "title": "cube" }"#).unwrap();
    assert_eq!(config.buffer_count, 3);
    assert_eq!(config.width, 800);
    assert_eq!(config.height, 720);
    assert_eq!(config.title, "cube");
    assert_eq!(config.present_interval, 0);
    assert_eq!(config.depth_stencil_format, gfx::Format::D24nS8u);
    assert!(config.validate().is_ok());
}

#[test]
fn config_load_validates() {
    let dir = std::env::temp_dir();
    let valid = dir.join("dxframe_tests_valid.json");
    std::fs::write(&valid, r#"{ "buffer_count": 3, "present_interval": 1 }"#).unwrap();
    let config = RenderConfig::load(&valid).unwrap();
    assert_eq!(config.buffer_count, 3);
    assert_eq!(config.present_interval, 1);

    let invalid = dir.join("dxframe_tests_invalid.json");
    std::fs::write(&invalid, r#"{ "buffer_count": 1 }"#).unwrap();
    assert!(matches!(RenderConfig::load(&invalid), Err(Error::Config(_))));

    let missing = dir.join("dxframe_tests_missing.json");
    let _ = std::fs::remove_file(&missing);
    assert_eq!(RenderConfig::load_or_default(&missing).unwrap(), RenderConfig::default());

    let _ = std::fs::remove_file(valid);
    let _ = std::fs::remove_file(invalid);
}

#[test]
fn invalid_config_rejected_before_device_creation() {
    let mut app = create_app();
    let config = RenderConfig {
        depth_stencil_format: gfx::Format::RGBA8n,
        ..Default::default()
    };
    assert!(matches!(
        NullContext::create(&mut app, config.clone()),
        Err(Error::Config(_))
    ));

    // an existing device does not skip validation
    let device = null::Device::create(&config.device_info()).unwrap();
    assert!(matches!(
        NullContext::create_with_device(&mut app, device, config),
        Err(Error::Config(_))
    ));
}

#[test]
fn shader_loaded_from_path() {
    let mut app = create_app();
    let config = RenderConfig {
        shader_path: Some(dxframe_rs::get_data_path("shaders/cube.hlsl")),
        ..Default::default()
    };
    let mut ctx = create_context(&mut app, config);
    ctx.render().unwrap();
    ctx.shutdown().unwrap();

    let mut app = create_app();
    let config = RenderConfig {
        shader_path: Some(dxframe_rs::get_data_path("shaders/missing.hlsl")),
        ..Default::default()
    };
    assert!(NullContext::create(&mut app, config).is_err());
}

#![cfg(target_os = "windows")]

use dxframe_rs::gfx::d3d12;
use dxframe_rs::os::win32;
use dxframe_rs::os::{AppInfo, Rect, WindowInfo};
use dxframe_rs::prelude::*;

fn create_app() -> win32::App {
    win32::App::create(AppInfo {
        name: String::from("dxframe_d3d12_tests"),
        dpi_aware: true,
    })
    .unwrap()
}

fn software_config() -> RenderConfig {
    RenderConfig {
        use_software_adapter: true,
        debug_layer: false,
        ..Default::default()
    }
}

#[test]
fn create_d3d12_device() {
    let device = d3d12::Device::create(&software_config().device_info()).unwrap();
    assert!(device.get_adapter_info().software);
}

#[test]
fn create_window() {
    let mut app = create_app();
    let win = app
        .create_window(WindowInfo {
            title: String::from("hello world!"),
            rect: Rect {
                x: 0,
                y: 0,
                width: 1280,
                height: 720,
            },
        })
        .unwrap();
    let size = win.get_size();
    assert_eq!(size.x, 1280);
    assert_eq!(size.y, 720);
    assert_eq!(win.get_title(), "hello world!");
}

#[test]
fn swap_chain_buffer_cycle() {
    let mut app = create_app();
    let mut ctx: Context<d3d12::Device, win32::App> =
        Context::create(&mut app, software_config()).unwrap();
    assert_eq!(ctx.surfaces().size(), (1280, 720));
    for i in 0..4 {
        assert_eq!(ctx.surfaces().current_buffer_index(), i % 2);
        ctx.render().unwrap();
    }
    ctx.resize(640, 480).unwrap();
    assert_eq!(ctx.surfaces().size(), (640, 480));
    assert_eq!(ctx.surfaces().current_buffer_index(), 0);
    ctx.shutdown().unwrap();
}

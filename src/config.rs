use crate::gfx::{ClearColour, DeviceInfo, Format, SwapChainInfo};
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction time settings for the renderer. Missing fields in a config file take the
/// values from `Default`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of swap chain back buffers
    pub buffer_count: u32,
    pub back_buffer_format: Format,
    pub depth_stencil_format: Format,
    /// Use the software rasteriser instead of a hardware adapter
    pub use_software_adapter: bool,
    /// Initial client width
    pub width: i32,
    /// Initial client height
    pub height: i32,
    /// Vsync interval passed to present, 0 presents immediately
    pub present_interval: u32,
    pub clear_colour: ClearColour,
    pub title: String,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Optional hlsl file to use instead of the built in cube shader
    pub shader_path: Option<String>,
    /// Enable the api debug layer, ignored in release builds
    pub debug_layer: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            buffer_count: 2,
            back_buffer_format: Format::RGBA8n,
            depth_stencil_format: Format::D24nS8u,
            use_software_adapter: false,
            width: 1280,
            height: 720,
            present_interval: 0,
            clear_colour: ClearColour {
                r: 0.2,
                g: 0.4,
                b: 0.6,
                a: 1.0,
            },
            title: String::from("DirectX Demo"),
            fov_degrees: 45.0,
            shader_path: None,
            debug_layer: true,
        }
    }
}

impl RenderConfig {
    /// Load and validate a json config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: RenderConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise use the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            tracing::info!("loading config: {}", path.as_ref().display());
            Self::load(path)
        } else {
            Ok(RenderConfig::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=16).contains(&self.buffer_count) {
            return Err(Error::Config(format!(
                "buffer_count must be in 2..=16, got {}",
                self.buffer_count
            )));
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::Config(format!(
                "initial size must be non zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.depth_stencil_format.is_depth() {
            return Err(Error::Config(format!(
                "{:?} is not a depth stencil format",
                self.depth_stencil_format
            )));
        }
        if self.back_buffer_format.is_depth() || self.back_buffer_format == Format::Unknown {
            return Err(Error::Config(format!(
                "{:?} is not a back buffer format",
                self.back_buffer_format
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(Error::Config(format!(
                "fov_degrees must be in (0, 180), got {}",
                self.fov_degrees
            )));
        }
        Ok(())
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            adapter_name: None,
            use_software_adapter: self.use_software_adapter,
            debug_layer: self.debug_layer && cfg!(debug_assertions),
        }
    }

    pub fn swap_chain_info(&self, width: u32, height: u32) -> SwapChainInfo {
        SwapChainInfo {
            num_buffers: self.buffer_count,
            format: self.back_buffer_format,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_count, 2);
        assert_eq!(config.back_buffer_format, Format::RGBA8n);
        assert_eq!(config.depth_stencil_format, Format::D24nS8u);
        assert_eq!((config.width, config.height), (1280, 720));
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "buffer_count": 3, "title": "cube" }"#).unwrap();
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.title, "cube");
        assert_eq!(config.width, 1280);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = RenderConfig {
            buffer_count: 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.buffer_count = 2;
        config.depth_stencil_format = Format::RGBA8n;
        assert!(config.validate().is_err());
        config.depth_stencil_format = Format::D32f;
        config.width = 0;
        assert!(config.validate().is_err());
    }
}

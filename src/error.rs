//! Error types for the particle field engine.
//!
//! Initialization failures (no GPU, broken shader programs) are fatal and
//! surface as typed errors. Framebuffer failures only disable the
//! post-processing chain, and per-frame pass failures never leave the frame.

use std::fmt;

/// Errors that can occur while acquiring the GPU.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter(wgpu::RequestAdapterError),
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The surface reported no usable texture format.
    UnsupportedSurface,
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter(e) => write!(
                f,
                "No compatible GPU adapter found ({}). Feature-detect a Vulkan/Metal/DX12/GL capable device before constructing the engine.",
                e
            ),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::UnsupportedSurface => write!(f, "Surface exposes no supported texture format"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::NoAdapter(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            GpuError::UnsupportedSurface => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestAdapterError> for GpuError {
    fn from(e: wgpu::RequestAdapterError) -> Self {
        GpuError::NoAdapter(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Shader stage that failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Errors produced while building a shader program.
///
/// A program that fails either way is never registered.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// One stage failed to parse or validate. `log` carries the compiler output.
    Compile {
        program: String,
        stage: ShaderStage,
        log: String,
    },
    /// Both stages compiled but could not be combined into a pipeline.
    Link { program: String, log: String },
}

impl ShaderError {
    /// The compiler or linker log.
    pub fn log(&self) -> &str {
        match self {
            ShaderError::Compile { log, .. } | ShaderError::Link { log, .. } => log,
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compile { program, stage, log } => {
                write!(f, "Failed to compile {} stage of program '{}':\n{}", stage, program, log)
            }
            ShaderError::Link { program, log } => {
                write!(f, "Failed to link program '{}':\n{}", program, log)
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// A render target could not be created at the requested size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferError {
    Incomplete {
        target: String,
        width: u32,
        height: u32,
        max_dimension: u32,
    },
}

impl fmt::Display for FramebufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramebufferError::Incomplete {
                target,
                width,
                height,
                max_dimension,
            } => write!(
                f,
                "Framebuffer '{}' incomplete at {}x{} (device limit {})",
                target, width, height, max_dimension
            ),
        }
    }
}

impl std::error::Error for FramebufferError {}

/// A single render pass could not run this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    /// A resource the pass samples from or renders into is not registered.
    MissingResource { pass: &'static str, resource: String },
    /// The post-processing chain is disabled after a framebuffer failure.
    Degraded,
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::MissingResource { pass, resource } => {
                write!(f, "Pass '{}' is missing resource '{}'", pass, resource)
            }
            PassError::Degraded => write!(f, "Post-processing is running in degraded mode"),
        }
    }
}

impl std::error::Error for PassError {}

/// Errors from the configuration manager.
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON or does not have the expected shape.
    Parse(serde_json::Error),
    /// Reading or writing a persisted document failed.
    Io(std::io::Error),
    /// No preset with this id exists.
    UnknownPreset(String),
    /// Built-in presets cannot be modified or deleted.
    BuiltInPreset(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "Failed to parse configuration document: {}", e),
            ConfigError::Io(e) => write!(f, "Failed to access configuration storage: {}", e),
            ConfigError::UnknownPreset(id) => write!(f, "Unknown preset '{}'", id),
            ConfigError::BuiltInPreset(id) => write!(f, "Preset '{}' is built in and cannot be changed", id),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Errors that can occur when constructing or running the engine.
#[derive(Debug)]
pub enum EngineError {
    /// GPU initialization failed.
    Gpu(GpuError),
    /// A shader program failed to compile or link.
    Shader(ShaderError),
    /// Configuration could not be loaded.
    Config(ConfigError),
    /// Failed to create the event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to open the window.
    Window(winit::error::OsError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Gpu(e) => write!(f, "GPU error: {}", e),
            EngineError::Shader(e) => write!(f, "Shader error: {}", e),
            EngineError::Config(e) => write!(f, "Config error: {}", e),
            EngineError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            EngineError::Window(e) => write!(f, "Failed to create window: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Gpu(e) => Some(e),
            EngineError::Shader(e) => Some(e),
            EngineError::Config(e) => Some(e),
            EngineError::EventLoop(e) => Some(e),
            EngineError::Window(e) => Some(e),
        }
    }
}

impl From<GpuError> for EngineError {
    fn from(e: GpuError) -> Self {
        EngineError::Gpu(e)
    }
}

impl From<ShaderError> for EngineError {
    fn from(e: ShaderError) -> Self {
        EngineError::Shader(e)
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<winit::error::OsError> for EngineError {
    fn from(e: winit::error::OsError) -> Self {
        EngineError::Window(e)
    }
}

impl From<winit::error::EventLoopError> for EngineError {
    fn from(e: winit::error::EventLoopError) -> Self {
        EngineError::EventLoop(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_error_carries_log() {
        let err = ShaderError::Compile {
            program: "particles".into(),
            stage: ShaderStage::Fragment,
            log: "expected ';'".into(),
        };
        assert_eq!(err.log(), "expected ';'");
        let text = err.to_string();
        assert!(text.contains("fragment"));
        assert!(text.contains("particles"));
    }

    #[test]
    fn test_config_error_from_parse() {
        let parse = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: ConfigError = parse.into();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}

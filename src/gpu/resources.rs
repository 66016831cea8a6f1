//! Named registries for GPU programs, buffers and render targets.
//!
//! Everything the renderer allocates goes through a [`ResourceRegistry`] so
//! it can be looked up by name, replaced without leaking the old handle,
//! counted toward [`memory_usage`](ResourceRegistry::memory_usage) and
//! released in one place on dispose.

use std::collections::HashMap;

use crate::error::FramebufferError;

use super::program::Program;

/// A buffer and its size in bytes.
#[derive(Debug)]
pub struct TrackedBuffer {
    pub buffer: wgpu::Buffer,
    pub size: u64,
}

/// A 2D texture with a default view.
#[derive(Debug)]
pub struct TrackedTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl TrackedTexture {
    pub fn byte_size(&self) -> u64 {
        let texel = self.format.block_copy_size(None).unwrap_or(4) as u64;
        self.width as u64 * self.height as u64 * texel
    }
}

/// Registry of named GPU resources.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    programs: HashMap<String, Program>,
    buffers: HashMap<String, TrackedBuffer>,
    framebuffers: HashMap<String, TrackedTexture>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Programs ==========

    /// Register a linked program, replacing any program of the same name.
    pub fn insert_program(&mut self, program: Program) {
        self.programs.insert(program.name.to_string(), program);
    }

    pub fn program(&self, name: &str) -> Option<&Program> {
        self.programs.get(name)
    }

    // ========== Buffers ==========

    /// Create (or replace) a zero-initialized buffer.
    pub fn create_buffer(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> &wgpu::Buffer {
        if let Some(old) = self.buffers.remove(name) {
            old.buffer.destroy();
        }
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size,
            usage,
            mapped_at_creation: false,
        });
        log::debug!("Created buffer '{}' ({} bytes)", name, size);
        &self
            .buffers
            .entry(name.to_string())
            .or_insert(TrackedBuffer { buffer, size })
            .buffer
    }

    pub fn buffer(&self, name: &str) -> Option<&TrackedBuffer> {
        self.buffers.get(name)
    }

    // ========== Framebuffers ==========

    /// Create (or replace) a render target that later passes can sample.
    ///
    /// A zero-sized target or one larger than `max_dimension` is incomplete:
    /// nothing is allocated, the previous target of that name is released,
    /// and the error is returned.
    pub fn create_framebuffer(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        max_dimension: u32,
    ) -> Result<&TrackedTexture, FramebufferError> {
        if let Err(e) = check_framebuffer(name, width, height, max_dimension) {
            if let Some(old) = self.framebuffers.remove(name) {
                old.texture.destroy();
            }
            return Err(e);
        }
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let target = new_texture(device, name, width, height, format, usage);
        Ok(replace(&mut self.framebuffers, name, target))
    }

    pub fn framebuffer(&self, name: &str) -> Option<&TrackedTexture> {
        self.framebuffers.get(name)
    }

    /// Release every framebuffer whose name starts with `prefix`.
    pub fn remove_framebuffers(&mut self, prefix: &str) {
        self.framebuffers.retain(|name, target| {
            let keep = !name.starts_with(prefix);
            if !keep {
                target.texture.destroy();
            }
            keep
        });
    }

    // ========== Accounting ==========

    /// Bytes held by buffers and framebuffers.
    pub fn memory_usage(&self) -> u64 {
        let buffers: u64 = self.buffers.values().map(|b| b.size).sum();
        let targets: u64 = self.framebuffers.values().map(TrackedTexture::byte_size).sum();
        buffers + targets
    }

    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            programs: self.programs.len(),
            buffers: self.buffers.len(),
            framebuffers: self.framebuffers.len(),
        }
    }

    /// Destroy everything. Safe to call repeatedly.
    pub fn clear(&mut self) {
        for (_, b) in self.buffers.drain() {
            b.buffer.destroy();
        }
        for (_, t) in self.framebuffers.drain() {
            t.texture.destroy();
        }
        self.programs.clear();
    }
}

/// Number of live resources per registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub programs: usize,
    pub buffers: usize,
    pub framebuffers: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.programs + self.buffers + self.framebuffers
    }
}

/// Completeness check for a render target.
pub fn check_framebuffer(name: &str, width: u32, height: u32, max_dimension: u32) -> Result<(), FramebufferError> {
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        return Err(FramebufferError::Incomplete {
            target: name.to_string(),
            width,
            height,
            max_dimension,
        });
    }
    Ok(())
}

fn new_texture(
    device: &wgpu::Device,
    name: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> TrackedTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(name),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    log::debug!("Created texture '{}' ({}x{})", name, width, height);
    TrackedTexture {
        texture,
        view,
        width,
        height,
        format,
    }
}

fn replace<'a>(map: &'a mut HashMap<String, TrackedTexture>, name: &str, texture: TrackedTexture) -> &'a TrackedTexture {
    if let Some(old) = map.insert(name.to_string(), texture) {
        old.texture.destroy();
    }
    // Just inserted.
    &map[name]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_completeness() {
        assert!(check_framebuffer("scene", 800, 600, 8192).is_ok());
        assert!(check_framebuffer("scene", 0, 600, 8192).is_err());
        let err = check_framebuffer("scene", 9000, 600, 8192).unwrap_err();
        assert_eq!(
            err,
            FramebufferError::Incomplete {
                target: "scene".into(),
                width: 9000,
                height: 600,
                max_dimension: 8192,
            }
        );
    }

    #[test]
    fn test_empty_registry() {
        let mut registry = ResourceRegistry::new();
        assert_eq!(registry.memory_usage(), 0);
        assert_eq!(registry.counts().total(), 0);
        registry.clear();
        registry.clear();
        assert!(registry.program("particle").is_none());
        assert!(registry.framebuffer("post.scene").is_none());
    }
}

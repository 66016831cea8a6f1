//! GPU renderer.
//!
//! Owns the wgpu surface, device and queue, every resource registry and the
//! post-processing chain. Each frame uploads the packed particle instances,
//! draws them as additive instanced quads into the scene target (or the
//! surface when post-processing is off or degraded) and then runs the
//! planned post passes.

pub mod post_process;
pub mod program;
pub mod resources;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use winit::window::Window;

use crate::config::ParticleFieldConfig;
use crate::device::DeviceCapabilities;
use crate::error::{EngineError, GpuError, PassError};
use crate::particles::GpuParticle;
use crate::shaders;

pub use post_process::{walk_chain, ChainTarget, ChainWalk, PassKind, PassPlan, PostProcessor, PostStats};
pub use program::{compile_program, CompiledProgram, ProgramInterface};
pub use resources::{ResourceCounts, ResourceRegistry};

use program::{create_program, ParticleBindings, PipelineOptions};

const INSTANCE_BUFFER: &str = "particle.instances";
const PARTICLE_PARAMS: &str = "particle.uniforms";
const MIN_INSTANCE_CAPACITY: usize = 1024;

/// Instance capacity to reallocate to when `needed` particles must fit in a
/// buffer of `current`, or `None` to keep the buffer.
///
/// Capacities are powers of two no smaller than [`MIN_INSTANCE_CAPACITY`].
/// The buffer grows as soon as it is too small and shrinks once it is more
/// than twice the fitted size, so a count hovering near a boundary does not
/// reallocate every frame.
pub fn instance_capacity_for(current: usize, needed: usize) -> Option<usize> {
    let fitted = needed.max(MIN_INSTANCE_CAPACITY).next_power_of_two();
    if needed > current || current > fitted * 2 {
        Some(fitted)
    } else {
        None
    }
}

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x2,
    1 => Float32x2,
    2 => Float32x3,
    3 => Float32,
    4 => Float32
];

/// Uniforms of the particle program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleParams {
    pub resolution: [f32; 2],
    pub time: f32,
    pub global_scale: f32,
    pub velocity_size_factor: f32,
    pub velocity_intensity: f32,
    pub flicker: f32,
    pub glow_falloff: f32,
    pub opacity: f32,
    pub _pad: [f32; 3],
}

impl ParticleParams {
    pub fn new(width: u32, height: u32, time: f32, config: &ParticleFieldConfig) -> Self {
        let visual = &config.visual;
        Self {
            resolution: [width as f32, height as f32],
            time,
            global_scale: visual.global_scale,
            velocity_size_factor: visual.velocity_size_factor,
            velocity_intensity: visual.velocity_intensity,
            flicker: visual.flicker,
            glow_falloff: visual.glow_falloff,
            opacity: config.particle.visual.opacity,
            _pad: [0.0; 3],
        }
    }
}

/// What one call to [`Renderer::render`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub skipped_passes: u32,
    pub presented: bool,
}

fn additive_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    capabilities: DeviceCapabilities,
    resources: ResourceRegistry,
    post: PostProcessor,
    particle_bind_group: wgpu::BindGroup,
    instance_capacity: usize,
    particle_count: usize,
    draw_calls: u32,
    disposed: bool,
}

impl Renderer {
    /// Acquire the GPU and build every program.
    ///
    /// Fails when no adapter or device is available or when a built-in
    /// program does not compile or link.
    pub async fn new(window: Arc<Window>, config: &ParticleFieldConfig) -> Result<Self, EngineError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).map_err(GpuError::from)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(GpuError::from)?;

        let capabilities = DeviceCapabilities::probe(&adapter);
        log::info!(
            "Using {} ({}, {})",
            capabilities.renderer,
            capabilities.backend,
            capabilities.vendor
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Particle Field Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(GpuError::from)?;

        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            log::error!("Uncaptured GPU error: {}", error);
        }));

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::UnsupportedSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&device, &surface_config);
        }

        let mut resources = ResourceRegistry::new();

        let instance_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuParticle>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        };
        let particle_program = create_program(
            &device,
            &shaders::PARTICLE,
            &PipelineOptions {
                vertex_buffers: &[instance_layout],
                format: surface_format,
                blend: Some(additive_blend()),
            },
        )?;
        let bindings = ParticleBindings::resolve(shaders::PARTICLE.name, &particle_program.interface)?;

        let params = resources.create_buffer(
            &device,
            PARTICLE_PARAMS,
            std::mem::size_of::<ParticleParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let particle_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &particle_program.pipeline.get_bind_group_layout(0),
            entries: &[wgpu::BindGroupEntry {
                binding: bindings.params,
                resource: params.as_entire_binding(),
            }],
        });
        resources.insert_program(particle_program);

        let instance_capacity = instance_capacity_for(0, config.particle.particle_count as usize)
            .unwrap_or(MIN_INSTANCE_CAPACITY);
        resources.create_buffer(
            &device,
            INSTANCE_BUFFER,
            (instance_capacity * std::mem::size_of::<GpuParticle>()) as u64,
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        );

        let post = PostProcessor::new(
            &device,
            &mut resources,
            surface_format,
            capabilities.max_texture_size,
            &config.post_process,
            size.width,
            size.height,
        )?;

        log::info!(
            "Renderer ready at {}x{} ({:?}, {} bytes of GPU resources)",
            size.width,
            size.height,
            surface_format,
            resources.memory_usage()
        );

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            capabilities,
            resources,
            post,
            particle_bind_group,
            instance_capacity,
            particle_count: config.particle.particle_count as usize,
            draw_calls: 0,
            disposed: false,
        })
    }

    /// Reconfigure the surface, resize every render target and refit the
    /// instance buffer to the current particle count.
    ///
    /// A zero-sized window is remembered but nothing is reallocated.
    pub fn resize(&mut self, width: u32, height: u32, config: &ParticleFieldConfig) {
        self.surface_config.width = width;
        self.surface_config.height = height;
        if width == 0 || height == 0 || self.disposed {
            return;
        }
        self.surface.configure(&self.device, &self.surface_config);
        // Failure leaves the chain degraded and is logged by the processor.
        let _ = self.post.resize(
            &self.device,
            &mut self.resources,
            width,
            height,
            config.post_process.bloom_levels,
        );
        self.fit_particle_capacity(self.particle_count);
    }

    /// React to a configuration change that affects GPU resources.
    pub fn apply_config(&mut self, config: &ParticleFieldConfig) {
        if self.disposed {
            return;
        }
        let _ = self
            .post
            .set_bloom_levels(&self.device, &mut self.resources, config.post_process.bloom_levels);
        self.particle_count = config.particle.particle_count as usize;
        self.fit_particle_capacity(self.particle_count);
    }

    /// Recreate the instance buffer when `count` particles no longer fit or
    /// the buffer is far larger than they need.
    pub fn fit_particle_capacity(&mut self, count: usize) {
        if self.disposed {
            return;
        }
        let Some(capacity) = instance_capacity_for(self.instance_capacity, count) else {
            return;
        };
        self.resources.create_buffer(
            &self.device,
            INSTANCE_BUFFER,
            (capacity * std::mem::size_of::<GpuParticle>()) as u64,
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        );
        log::debug!("Instance buffer resized from {} to {} particles", self.instance_capacity, capacity);
        self.instance_capacity = capacity;
    }

    /// Draw one frame.
    pub fn render(&mut self, particles: &[GpuParticle], time: f32, config: &ParticleFieldConfig) -> RenderStats {
        let (width, height) = (self.surface_config.width, self.surface_config.height);
        if self.disposed || width == 0 || height == 0 {
            return RenderStats::default();
        }

        self.particle_count = particles.len();
        self.fit_particle_capacity(self.particle_count);
        if let Some(params) = self.resources.buffer(PARTICLE_PARAMS) {
            let uniforms = ParticleParams::new(width, height, time, config);
            self.queue.write_buffer(&params.buffer, 0, bytemuck::bytes_of(&uniforms));
        }
        if let (Some(instances), false) = (self.resources.buffer(INSTANCE_BUFFER), particles.is_empty()) {
            self.queue.write_buffer(&instances.buffer, 0, bytemuck::cast_slice(particles));
        }

        let plan = self.post.plan(config);
        if !plan.is_direct() {
            self.post
                .write_uniforms(&self.queue, &self.resources, &config.post_process, time);
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                return RenderStats::default();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Timed out acquiring the next frame");
                return RenderStats::default();
            }
            Err(e) => {
                log::error!("Failed to acquire the next frame: {}", e);
                return RenderStats::default();
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        let mut stats = RenderStats::default();
        let scene = if plan.is_direct() {
            None
        } else {
            self.resources.framebuffer(post_process::SCENE_TARGET)
        };
        let target = scene.map(|t| &t.view).unwrap_or(&view);

        match self.draw_particles(&mut encoder, target, particles.len() as u32, config.visual.background) {
            Ok(draws) => stats.draw_calls += draws,
            Err(e) => log::warn!("Skipping particle pass this frame: {}", e),
        }

        if scene.is_some() {
            let post = self
                .post
                .execute(&self.device, &mut encoder, &self.resources, &plan, &view);
            stats.draw_calls += post.draw_calls;
            stats.skipped_passes = post.skipped_passes;
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        stats.presented = true;
        self.draw_calls = stats.draw_calls;
        stats
    }

    fn draw_particles(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        count: u32,
        background: [f32; 3],
    ) -> Result<u32, PassError> {
        let missing = |resource: &str| PassError::MissingResource {
            pass: "particles",
            resource: resource.to_string(),
        };
        let program = self
            .resources
            .program(shaders::PARTICLE.name)
            .ok_or_else(|| missing(shaders::PARTICLE.name))?;
        let instances = self
            .resources
            .buffer(INSTANCE_BUFFER)
            .ok_or_else(|| missing(INSTANCE_BUFFER))?;

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: background[0] as f64,
                        g: background[1] as f64,
                        b: background[2] as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if count == 0 {
            return Ok(0);
        }
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &self.particle_bind_group, &[]);
        render_pass.set_vertex_buffer(0, instances.buffer.slice(..));
        render_pass.draw(0..6, 0..count);
        Ok(1)
    }

    /// Draw calls issued by the last rendered frame.
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    /// Bytes of GPU memory held by registered resources.
    pub fn memory_usage(&self) -> u64 {
        self.resources.memory_usage()
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        self.resources.counts()
    }

    pub fn is_degraded(&self) -> bool {
        self.post.is_degraded()
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Release every GPU resource. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.resources.clear();
        self.disposed = true;
        log::info!("Renderer disposed");
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_params_layout() {
        assert_eq!(std::mem::size_of::<ParticleParams>(), 48);
        let params = ParticleParams::new(800, 600, 2.5, &ParticleFieldConfig::default());
        assert_eq!(params.resolution, [800.0, 600.0]);
        assert_eq!(params.opacity, ParticleFieldConfig::default().particle.visual.opacity);
    }

    #[test]
    fn test_instance_capacity_grows_and_shrinks() {
        assert_eq!(instance_capacity_for(0, 100), Some(MIN_INSTANCE_CAPACITY));
        assert_eq!(instance_capacity_for(1024, 1024), None);
        assert_eq!(instance_capacity_for(1024, 1025), Some(2048));
        assert_eq!(instance_capacity_for(8192, 5000), None);

        // Adaptive drop from 8000 to 800 particles
        assert_eq!(instance_capacity_for(8192, 800), Some(1024));
        // Hovering just below a boundary keeps the buffer
        assert_eq!(instance_capacity_for(4096, 2047), None);
        assert_eq!(instance_capacity_for(4096, 1000), Some(1024));
    }

    #[test]
    fn test_instance_attributes_match_particle_layout() {
        let offsets: Vec<u64> = INSTANCE_ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 28, 32]);
        let last = INSTANCE_ATTRIBUTES[4];
        assert_eq!(
            last.offset + last.format.size(),
            std::mem::size_of::<GpuParticle>() as u64
        );
    }
}

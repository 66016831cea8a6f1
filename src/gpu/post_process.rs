//! Post-processing chain.
//!
//! The particle scene renders into an offscreen target, then a fixed
//! sequence of fullscreen passes runs over it:
//!
//! ```text
//! scene → blur H → blur V → bloom → color correction → final composite → surface
//! ```
//!
//! Disabled passes are left out of the [`PassPlan`] entirely, so they cost
//! nothing. Intermediate results ping-pong between two full-resolution
//! targets and the last planned pass writes straight to the surface. When
//! nothing is planned, or the chain is degraded after a framebuffer
//! failure, the renderer draws particles directly to the surface instead.
//!
//! Bloom uses a half-resolution mip chain: extract bright pixels into
//! level 0, downsample level by level, then upsample back with additive
//! blending and composite level 0 over the input.

use bytemuck::{Pod, Zeroable};

use crate::config::{ParticleFieldConfig, PostProcessConfig};
use crate::error::{FramebufferError, PassError, ShaderError};
use crate::shaders::{self, ProgramSource};

use super::program::{create_program, PassBindings, PipelineOptions};
use super::resources::ResourceRegistry;

/// Offscreen target the particle pass renders into.
pub const SCENE_TARGET: &str = "post.scene";
const PING_TARGET: &str = "post.ping";
const PONG_TARGET: &str = "post.pong";

/// Upper bound on bloom mip levels.
pub const MAX_BLOOM_LEVELS: u32 = 8;

const BLUR_H_PARAMS: &str = "post.uniforms.blur.h";
const BLUR_V_PARAMS: &str = "post.uniforms.blur.v";
const BLOOM_EXTRACT_PARAMS: &str = "post.uniforms.bloom.extract";
const BLOOM_COMPOSITE_PARAMS: &str = "post.uniforms.bloom.composite";
const COLOR_PARAMS: &str = "post.uniforms.color";
const COMPOSITE_PARAMS: &str = "post.uniforms.composite";

fn bloom_target(level: u32) -> String {
    format!("post.bloom.{}", level)
}

fn bloom_down_params(level: u32) -> String {
    format!("post.uniforms.bloom.down.{}", level)
}

fn bloom_up_params(level: u32) -> String {
    format!("post.uniforms.bloom.up.{}", level)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurParams {
    pub direction: [f32; 2],
    pub texel: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BloomParams {
    pub texel: [f32; 2],
    pub threshold: f32,
    pub strength: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorParams {
    pub tint: [f32; 3],
    pub contrast: f32,
    pub brightness: f32,
    pub saturation: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositeParams {
    pub resolution: [f32; 2],
    pub time: f32,
    pub vignette: f32,
    pub grain: f32,
    pub chromatic_offset: f32,
    pub _pad: [f32; 2],
}

/// One stage of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    BlurHorizontal,
    BlurVertical,
    Bloom,
    ColorCorrection,
    FinalComposite,
}

impl PassKind {
    pub fn name(&self) -> &'static str {
        match self {
            PassKind::BlurHorizontal => "blur-horizontal",
            PassKind::BlurVertical => "blur-vertical",
            PassKind::Bloom => "bloom",
            PassKind::ColorCorrection => "color-correction",
            PassKind::FinalComposite => "final-composite",
        }
    }
}

/// Ordered list of passes that run this frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassPlan {
    passes: Vec<PassKind>,
}

impl PassPlan {
    /// Plan the chain for `config`. A degraded chain plans nothing.
    pub fn build(config: &ParticleFieldConfig, degraded: bool) -> Self {
        let mut passes = Vec::with_capacity(5);
        if !degraded && config.post_process.enabled {
            if config.blur_active() {
                passes.push(PassKind::BlurHorizontal);
                passes.push(PassKind::BlurVertical);
            }
            if config.bloom_active() {
                passes.push(PassKind::Bloom);
            }
            if config.color_correction_active() {
                passes.push(PassKind::ColorCorrection);
            }
            if config.post_process.composite_enabled {
                passes.push(PassKind::FinalComposite);
            }
        }
        Self { passes }
    }

    pub fn passes(&self) -> &[PassKind] {
        &self.passes
    }

    /// True when particles should render straight to the surface.
    pub fn is_direct(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn contains(&self, kind: PassKind) -> bool {
        self.passes.contains(&kind)
    }
}

/// Bloom levels that fit a `width × height` viewport.
pub fn effective_bloom_levels(width: u32, height: u32, requested: u32) -> u32 {
    let smallest = width.min(height).max(1);
    let fit = 31 - smallest.leading_zeros();
    requested.min(fit).clamp(1, MAX_BLOOM_LEVELS)
}

/// Size of bloom level `level`: half the viewport per level.
pub fn bloom_level_size(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> (level + 1)).max(1), (height >> (level + 1)).max(1))
}

/// Where one pass of the chain writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTarget {
    Surface,
    Framebuffer(&'static str),
}

/// What walking a [`PassPlan`] produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainWalk {
    pub stats: PostStats,
    /// Target holding the last good result, set when the final pass failed
    /// and that result still has to be copied to the surface.
    pub fallback: Option<&'static str>,
}

/// Run every planned pass through `run(pass, source, target)`.
///
/// Results ping-pong from the scene target and the last pass writes to the
/// surface. A failed pass is counted, logged and skipped, so the next pass
/// reads the last good result instead.
pub fn walk_chain<F>(plan: &PassPlan, mut run: F) -> ChainWalk
where
    F: FnMut(PassKind, &'static str, ChainTarget) -> Result<u32, PassError>,
{
    let mut walk = ChainWalk::default();
    let Some(last) = plan.passes().len().checked_sub(1) else {
        return walk;
    };

    let mut current = SCENE_TARGET;
    let mut presented = false;
    for (i, pass) in plan.passes().iter().enumerate() {
        let next = if current == PING_TARGET { PONG_TARGET } else { PING_TARGET };
        let target = if i == last {
            ChainTarget::Surface
        } else {
            ChainTarget::Framebuffer(next)
        };
        match run(*pass, current, target) {
            Ok(draws) => {
                walk.stats.draw_calls += draws;
                if i == last {
                    presented = true;
                } else {
                    current = next;
                }
            }
            Err(e) => {
                walk.stats.skipped_passes += 1;
                log::warn!("Skipping {} pass this frame: {}", pass.name(), e);
            }
        }
    }

    if !presented {
        walk.fallback = Some(current);
    }
    walk
}

/// Counters from one execution of the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostStats {
    pub draw_calls: u32,
    pub skipped_passes: u32,
}

#[derive(Debug, Clone, Copy)]
struct PostBindings {
    blur: PassBindings,
    extract: PassBindings,
    downsample: PassBindings,
    upsample: PassBindings,
    composite: PassBindings,
    color: PassBindings,
    final_composite: PassBindings,
    copy: PassBindings,
}

enum Dest<'a> {
    Surface(&'a wgpu::TextureView),
    Framebuffer(&'a str),
}

/// One fullscreen draw.
struct Blit<'a> {
    pass: &'static str,
    program: &'static str,
    bindings: PassBindings,
    source: &'a str,
    bloom: Option<&'a str>,
    params: Option<&'a str>,
    additive: bool,
}

/// Owns the post chain's programs, targets and uniforms.
#[derive(Debug)]
pub struct PostProcessor {
    bindings: PostBindings,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
    max_dimension: u32,
    width: u32,
    height: u32,
    bloom_levels: u32,
    degraded: bool,
}

impl PostProcessor {
    /// Build every post program and uniform buffer, then size the targets.
    ///
    /// Shader failures are returned. A framebuffer failure only leaves the
    /// processor degraded.
    pub fn new(
        device: &wgpu::Device,
        resources: &mut ResourceRegistry,
        format: wgpu::TextureFormat,
        max_dimension: u32,
        config: &PostProcessConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, ShaderError> {
        let mut build = |source: &ProgramSource, additive: bool| -> Result<PassBindings, ShaderError> {
            let blend = additive.then_some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::OVER,
            });
            let program = create_program(
                device,
                source,
                &PipelineOptions {
                    vertex_buffers: &[],
                    format,
                    blend,
                },
            )?;
            let bindings = PassBindings::resolve(source.name, &program.interface)?;
            resources.insert_program(program);
            Ok(bindings)
        };

        let bindings = PostBindings {
            blur: build(&shaders::BLUR, false)?,
            extract: build(&shaders::BLOOM_EXTRACT, false)?,
            downsample: build(&shaders::BLOOM_DOWNSAMPLE, false)?,
            upsample: build(&shaders::BLOOM_UPSAMPLE, true)?,
            composite: build(&shaders::BLOOM_COMPOSITE, false)?,
            color: build(&shaders::COLOR_CORRECTION, false)?,
            final_composite: build(&shaders::FINAL_COMPOSITE, false)?,
            copy: build(&shaders::COPY, false)?,
        };

        let uniform = wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST;
        let blur_size = std::mem::size_of::<BlurParams>() as u64;
        let bloom_size = std::mem::size_of::<BloomParams>() as u64;
        resources.create_buffer(device, BLUR_H_PARAMS, blur_size, uniform);
        resources.create_buffer(device, BLUR_V_PARAMS, blur_size, uniform);
        resources.create_buffer(device, BLOOM_EXTRACT_PARAMS, bloom_size, uniform);
        resources.create_buffer(device, BLOOM_COMPOSITE_PARAMS, bloom_size, uniform);
        for level in 1..MAX_BLOOM_LEVELS {
            resources.create_buffer(device, &bloom_down_params(level), bloom_size, uniform);
            resources.create_buffer(device, &bloom_up_params(level), bloom_size, uniform);
        }
        resources.create_buffer(device, COLOR_PARAMS, std::mem::size_of::<ColorParams>() as u64, uniform);
        resources.create_buffer(
            device,
            COMPOSITE_PARAMS,
            std::mem::size_of::<CompositeParams>() as u64,
            uniform,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut processor = Self {
            bindings,
            sampler,
            format,
            max_dimension,
            width: 0,
            height: 0,
            bloom_levels: 0,
            degraded: false,
        };
        // Degraded on failure; logged inside.
        let _ = processor.resize(device, resources, width, height, config.bloom_levels);
        Ok(processor)
    }

    /// Recreate every sized target.
    ///
    /// On failure all post targets are released and the processor stays
    /// degraded until a later resize succeeds.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        resources: &mut ResourceRegistry,
        width: u32,
        height: u32,
        bloom_levels: u32,
    ) -> Result<(), FramebufferError> {
        self.width = width;
        self.height = height;
        resources.remove_framebuffers("post.");

        match self.allocate(device, resources, width, height, bloom_levels) {
            Ok(levels) => {
                if self.degraded {
                    log::info!("Post-processing restored at {}x{}", width, height);
                }
                self.bloom_levels = levels;
                self.degraded = false;
                Ok(())
            }
            Err(e) => {
                resources.remove_framebuffers("post.");
                self.bloom_levels = 0;
                self.degraded = true;
                log::warn!("{}; falling back to direct rendering without post-processing", e);
                Err(e)
            }
        }
    }

    fn allocate(
        &self,
        device: &wgpu::Device,
        resources: &mut ResourceRegistry,
        width: u32,
        height: u32,
        bloom_levels: u32,
    ) -> Result<u32, FramebufferError> {
        let (format, max) = (self.format, self.max_dimension);
        for name in [SCENE_TARGET, PING_TARGET, PONG_TARGET] {
            resources.create_framebuffer(device, name, width, height, format, max)?;
        }
        let levels = effective_bloom_levels(width, height, bloom_levels);
        for level in 0..levels {
            let (w, h) = bloom_level_size(width, height, level);
            resources.create_framebuffer(device, &bloom_target(level), w, h, format, max)?;
        }
        log::debug!("Post targets sized to {}x{} with {} bloom levels", width, height, levels);
        Ok(levels)
    }

    /// Reallocate the bloom chain if `requested` changes the level count.
    pub fn set_bloom_levels(
        &mut self,
        device: &wgpu::Device,
        resources: &mut ResourceRegistry,
        requested: u32,
    ) -> Result<(), FramebufferError> {
        if self.degraded || effective_bloom_levels(self.width, self.height, requested) == self.bloom_levels {
            return Ok(());
        }
        self.resize(device, resources, self.width, self.height, requested)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn bloom_levels(&self) -> u32 {
        self.bloom_levels
    }

    pub fn plan(&self, config: &ParticleFieldConfig) -> PassPlan {
        PassPlan::build(config, self.degraded)
    }

    /// Upload this frame's pass parameters.
    pub fn write_uniforms(
        &self,
        queue: &wgpu::Queue,
        resources: &ResourceRegistry,
        config: &PostProcessConfig,
        time: f32,
    ) {
        let write = |name: &str, bytes: &[u8]| match resources.buffer(name) {
            Some(tracked) => queue.write_buffer(&tracked.buffer, 0, bytes),
            None => log::debug!("Uniform buffer '{}' not registered", name),
        };

        let (w, h) = (self.width.max(1) as f32, self.height.max(1) as f32);
        let texel = [1.0 / w, 1.0 / h];

        write(
            BLUR_H_PARAMS,
            bytemuck::bytes_of(&BlurParams {
                direction: [config.blur_amount, 0.0],
                texel,
            }),
        );
        write(
            BLUR_V_PARAMS,
            bytemuck::bytes_of(&BlurParams {
                direction: [0.0, config.blur_amount],
                texel,
            }),
        );

        let bloom = BloomParams {
            texel,
            threshold: config.bloom_threshold,
            strength: config.bloom_strength,
        };
        write(BLOOM_EXTRACT_PARAMS, bytemuck::bytes_of(&bloom));
        write(BLOOM_COMPOSITE_PARAMS, bytemuck::bytes_of(&bloom));
        for level in 1..self.bloom_levels {
            let (sw, sh) = bloom_level_size(self.width, self.height, level - 1);
            let down = BloomParams {
                texel: [1.0 / sw as f32, 1.0 / sh as f32],
                ..bloom
            };
            write(&bloom_down_params(level), bytemuck::bytes_of(&down));

            let (sw, sh) = bloom_level_size(self.width, self.height, level);
            let up = BloomParams {
                texel: [1.0 / sw as f32, 1.0 / sh as f32],
                ..bloom
            };
            write(&bloom_up_params(level), bytemuck::bytes_of(&up));
        }

        write(
            COLOR_PARAMS,
            bytemuck::bytes_of(&ColorParams {
                tint: config.tint,
                contrast: config.contrast,
                brightness: config.brightness,
                saturation: config.saturation,
                _pad: [0.0; 2],
            }),
        );
        write(
            COMPOSITE_PARAMS,
            bytemuck::bytes_of(&CompositeParams {
                resolution: [w, h],
                time,
                vignette: config.vignette,
                grain: config.grain,
                chromatic_offset: config.chromatic_offset,
                _pad: [0.0; 2],
            }),
        );
    }

    /// Encode `plan` reading [`SCENE_TARGET`] and ending on `output`.
    ///
    /// A failing pass is logged and skipped for this frame; the next pass
    /// reads the last successful output. If the pass meant to write
    /// `output` fails, the last result is copied there instead.
    pub fn execute(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        resources: &ResourceRegistry,
        plan: &PassPlan,
        output: &wgpu::TextureView,
    ) -> PostStats {
        let walk = walk_chain(plan, |pass, source, target| {
            let dest = match target {
                ChainTarget::Surface => Dest::Surface(output),
                ChainTarget::Framebuffer(name) => Dest::Framebuffer(name),
            };
            self.run_pass(pass, device, encoder, resources, source, dest)
        });
        let mut stats = walk.stats;

        if let Some(source) = walk.fallback {
            let copy = Blit {
                pass: "present-copy",
                program: shaders::COPY.name,
                bindings: self.bindings.copy,
                source,
                bloom: None,
                params: None,
                additive: false,
            };
            match self.blit(&copy, device, encoder, resources, Dest::Surface(output)) {
                Ok(()) => stats.draw_calls += 1,
                Err(e) => log::warn!("Could not present post-processing result: {}", e),
            }
        }

        stats
    }

    fn run_pass(
        &self,
        pass: PassKind,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        resources: &ResourceRegistry,
        source: &str,
        dest: Dest<'_>,
    ) -> Result<u32, PassError> {
        let simple = |program: &'static str, bindings: PassBindings, params: &'static str| Blit {
            pass: pass.name(),
            program,
            bindings,
            source,
            bloom: None,
            params: Some(params),
            additive: false,
        };

        match pass {
            PassKind::BlurHorizontal => {
                let blit = simple(shaders::BLUR.name, self.bindings.blur, BLUR_H_PARAMS);
                self.blit(&blit, device, encoder, resources, dest).map(|()| 1)
            }
            PassKind::BlurVertical => {
                let blit = simple(shaders::BLUR.name, self.bindings.blur, BLUR_V_PARAMS);
                self.blit(&blit, device, encoder, resources, dest).map(|()| 1)
            }
            PassKind::ColorCorrection => {
                let blit = simple(shaders::COLOR_CORRECTION.name, self.bindings.color, COLOR_PARAMS);
                self.blit(&blit, device, encoder, resources, dest).map(|()| 1)
            }
            PassKind::FinalComposite => {
                let blit = simple(
                    shaders::FINAL_COMPOSITE.name,
                    self.bindings.final_composite,
                    COMPOSITE_PARAMS,
                );
                self.blit(&blit, device, encoder, resources, dest).map(|()| 1)
            }
            PassKind::Bloom => self.run_bloom(device, encoder, resources, source, dest),
        }
    }

    fn run_bloom(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        resources: &ResourceRegistry,
        source: &str,
        dest: Dest<'_>,
    ) -> Result<u32, PassError> {
        if self.bloom_levels == 0 {
            return Err(PassError::Degraded);
        }
        let levels: Vec<String> = (0..self.bloom_levels).map(bloom_target).collect();
        let mut draws = 0;

        let extract = Blit {
            pass: "bloom-extract",
            program: shaders::BLOOM_EXTRACT.name,
            bindings: self.bindings.extract,
            source,
            bloom: None,
            params: Some(BLOOM_EXTRACT_PARAMS),
            additive: false,
        };
        self.blit(&extract, device, encoder, resources, Dest::Framebuffer(levels[0].as_str()))?;
        draws += 1;

        for level in 1..self.bloom_levels {
            let params = bloom_down_params(level);
            let down = Blit {
                pass: "bloom-downsample",
                program: shaders::BLOOM_DOWNSAMPLE.name,
                bindings: self.bindings.downsample,
                source: levels[level as usize - 1].as_str(),
                bloom: None,
                params: Some(params.as_str()),
                additive: false,
            };
            self.blit(&down, device, encoder, resources, Dest::Framebuffer(levels[level as usize].as_str()))?;
            draws += 1;
        }

        for level in (1..self.bloom_levels).rev() {
            let params = bloom_up_params(level);
            let up = Blit {
                pass: "bloom-upsample",
                program: shaders::BLOOM_UPSAMPLE.name,
                bindings: self.bindings.upsample,
                source: levels[level as usize].as_str(),
                bloom: None,
                params: Some(params.as_str()),
                additive: true,
            };
            self.blit(&up, device, encoder, resources, Dest::Framebuffer(levels[level as usize - 1].as_str()))?;
            draws += 1;
        }

        let composite = Blit {
            pass: "bloom-composite",
            program: shaders::BLOOM_COMPOSITE.name,
            bindings: self.bindings.composite,
            source,
            bloom: Some(levels[0].as_str()),
            params: Some(BLOOM_COMPOSITE_PARAMS),
            additive: false,
        };
        self.blit(&composite, device, encoder, resources, dest)?;
        Ok(draws + 1)
    }

    fn blit(
        &self,
        blit: &Blit<'_>,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        resources: &ResourceRegistry,
        dest: Dest<'_>,
    ) -> Result<(), PassError> {
        let missing = |resource: &str| PassError::MissingResource {
            pass: blit.pass,
            resource: resource.to_string(),
        };

        let program = resources.program(blit.program).ok_or_else(|| missing(blit.program))?;
        let source = resources.framebuffer(blit.source).ok_or_else(|| missing(blit.source))?;

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: blit.bindings.source,
                resource: wgpu::BindingResource::TextureView(&source.view),
            },
            wgpu::BindGroupEntry {
                binding: blit.bindings.sampler,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        if let Some(binding) = blit.bindings.params {
            let name = blit.params.ok_or_else(|| missing("params"))?;
            let buffer = resources.buffer(name).ok_or_else(|| missing(name))?;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.buffer.as_entire_binding(),
            });
        }
        if let Some(binding) = blit.bindings.bloom {
            let name = blit.bloom.ok_or_else(|| missing("bloom_texture"))?;
            let bloom = resources.framebuffer(name).ok_or_else(|| missing(name))?;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&bloom.view),
            });
        }

        let layout = program.pipeline.get_bind_group_layout(0);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(blit.pass),
            layout: &layout,
            entries: &entries,
        });

        let target = match dest {
            Dest::Surface(view) => view,
            Dest::Framebuffer(name) => &resources.framebuffer(name).ok_or_else(|| missing(name))?.view,
        };
        let load = if blit.additive {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(blit.pass),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_for(edit: impl FnOnce(&mut ParticleFieldConfig)) -> Vec<PassKind> {
        let mut config = ParticleFieldConfig::default();
        edit(&mut config);
        PassPlan::build(&config, false).passes().to_vec()
    }

    type Step = (PassKind, &'static str, ChainTarget);

    /// Walk the default plan, failing every pass in `failing`.
    fn walk_default(failing: &[PassKind]) -> (ChainWalk, Vec<Step>) {
        let plan = PassPlan::build(&ParticleFieldConfig::default(), false);
        let mut steps = Vec::new();
        let walk = walk_chain(&plan, |pass, source, target| {
            steps.push((pass, source, target));
            if failing.contains(&pass) {
                Err(PassError::MissingResource {
                    pass: pass.name(),
                    resource: "post.ping".into(),
                })
            } else {
                Ok(1)
            }
        });
        (walk, steps)
    }

    #[test]
    fn test_walk_ping_pongs_to_surface() {
        let (walk, steps) = walk_default(&[]);
        assert_eq!(
            steps,
            vec![
                (PassKind::Bloom, SCENE_TARGET, ChainTarget::Framebuffer(PING_TARGET)),
                (PassKind::ColorCorrection, PING_TARGET, ChainTarget::Framebuffer(PONG_TARGET)),
                (PassKind::FinalComposite, PONG_TARGET, ChainTarget::Surface),
            ]
        );
        assert_eq!(walk.stats, PostStats { draw_calls: 3, skipped_passes: 0 });
        assert_eq!(walk.fallback, None);
    }

    #[test]
    fn test_failed_pass_is_skipped() {
        let (walk, steps) = walk_default(&[PassKind::ColorCorrection]);
        // The composite reads bloom's output, not the failed pass's target.
        assert_eq!(steps[2], (PassKind::FinalComposite, PING_TARGET, ChainTarget::Surface));
        assert_eq!(walk.stats, PostStats { draw_calls: 2, skipped_passes: 1 });
        assert_eq!(walk.fallback, None);
    }

    #[test]
    fn test_failed_final_pass_falls_back_to_last_good_result() {
        let (walk, _) = walk_default(&[PassKind::FinalComposite]);
        assert_eq!(walk.stats.skipped_passes, 1);
        assert_eq!(walk.fallback, Some(PONG_TARGET));

        let (walk, _) = walk_default(&[PassKind::Bloom, PassKind::ColorCorrection, PassKind::FinalComposite]);
        assert_eq!(walk.stats, PostStats { draw_calls: 0, skipped_passes: 3 });
        assert_eq!(walk.fallback, Some(SCENE_TARGET));
    }

    #[test]
    fn test_direct_plan_runs_nothing() {
        let plan = PassPlan::build(&ParticleFieldConfig::default(), true);
        let mut calls = 0;
        let walk = walk_chain(&plan, |_, _, _| {
            calls += 1;
            Ok(1)
        });
        assert_eq!(calls, 0);
        assert_eq!(walk, ChainWalk::default());
    }

    #[test]
    fn test_default_plan() {
        assert_eq!(
            plan_for(|_| {}),
            vec![PassKind::Bloom, PassKind::ColorCorrection, PassKind::FinalComposite]
        );
    }

    #[test]
    fn test_full_plan_order() {
        let passes = plan_for(|c| {
            c.post_process.blur_enabled = true;
            c.particle.effects.blur = true;
        });
        assert_eq!(
            passes,
            vec![
                PassKind::BlurHorizontal,
                PassKind::BlurVertical,
                PassKind::Bloom,
                PassKind::ColorCorrection,
                PassKind::FinalComposite,
            ]
        );
    }

    #[test]
    fn test_disabled_pass_is_bypassed() {
        let passes = plan_for(|c| c.post_process.bloom_enabled = false);
        assert!(!passes.contains(&PassKind::Bloom));
        assert_eq!(passes.first(), Some(&PassKind::ColorCorrection));
    }

    #[test]
    fn test_master_switch_and_degraded_are_direct() {
        let mut config = ParticleFieldConfig::default();
        assert!(PassPlan::build(&config, true).is_direct());
        config.post_process.enabled = false;
        assert!(PassPlan::build(&config, false).is_direct());
    }

    #[test]
    fn test_everything_off_is_direct() {
        let passes = plan_for(|c| {
            c.post_process.bloom_enabled = false;
            c.post_process.color_correction_enabled = false;
            c.post_process.composite_enabled = false;
        });
        assert!(passes.is_empty());
    }

    #[test]
    fn test_bloom_levels_fit_viewport() {
        assert_eq!(effective_bloom_levels(1920, 1080, 5), 5);
        assert_eq!(effective_bloom_levels(16, 16, 8), 4);
        assert_eq!(effective_bloom_levels(1, 1, 5), 1);
        assert_eq!(effective_bloom_levels(4096, 4096, 20), MAX_BLOOM_LEVELS);
    }

    #[test]
    fn test_bloom_level_sizes_halve() {
        assert_eq!(bloom_level_size(800, 600, 0), (400, 300));
        assert_eq!(bloom_level_size(800, 600, 1), (200, 150));
        assert_eq!(bloom_level_size(3, 3, 4), (1, 1));
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<BlurParams>(), 16);
        assert_eq!(std::mem::size_of::<BloomParams>(), 16);
        assert_eq!(std::mem::size_of::<ColorParams>(), 32);
        assert_eq!(std::mem::size_of::<CompositeParams>(), 32);
    }
}

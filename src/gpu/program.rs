//! Shader program compilation and linking.
//!
//! A program is a vertex source plus a fragment source. Building one runs
//! in two steps, mirroring a classic compile/link split:
//!
//! - **compile**: each stage is parsed and validated by naga on its own.
//!   Errors carry naga's annotated log.
//! - **link**: the fragment inputs must match the vertex outputs location by
//!   location and type by type, resource bindings must agree across stages,
//!   and the render pipeline must be accepted by the device.
//!
//! Binding names are reflected once at link time into typed structs
//! ([`PassBindings`], [`ParticleBindings`]) so nothing looks up bindings by
//! name while drawing.

use std::borrow::Cow;
use std::collections::BTreeMap;

use naga::front::wgsl;
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

use crate::error::{ShaderError, ShaderStage};
use crate::shaders::ProgramSource;

/// What a resource binding holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Uniform,
    Storage,
    Texture,
    Sampler,
}

/// One reflected resource binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

/// Everything reflected from a linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    /// Resource bindings used by either stage, sorted by group then binding.
    pub bindings: Vec<BindingInfo>,
    /// Vertex attribute locations the vertex stage consumes.
    pub vertex_inputs: Vec<u32>,
    /// Locations passed from the vertex to the fragment stage.
    pub varyings: Vec<u32>,
}

impl ProgramInterface {
    pub fn binding(&self, name: &str) -> Option<&BindingInfo> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Binding index of `name` in group 0, or a link error if it is absent
    /// or holds the wrong kind of resource.
    pub fn require(&self, program: &str, name: &str, kind: BindingKind) -> Result<u32, ShaderError> {
        match self.optional(program, name, kind)? {
            Some(binding) => Ok(binding),
            None => Err(ShaderError::Link {
                program: program.to_string(),
                log: format!("required binding '{}' not found", name),
            }),
        }
    }

    pub fn optional(&self, program: &str, name: &str, kind: BindingKind) -> Result<Option<u32>, ShaderError> {
        match self.binding(name) {
            None => Ok(None),
            Some(info) if info.kind != kind => Err(ShaderError::Link {
                program: program.to_string(),
                log: format!("binding '{}' is {:?}, expected {:?}", name, info.kind, kind),
            }),
            Some(info) if info.group != 0 => Err(ShaderError::Link {
                program: program.to_string(),
                log: format!("binding '{}' must be in group 0, found group {}", name, info.group),
            }),
            Some(info) => Ok(Some(info.binding)),
        }
    }
}

/// A validated single-stage module.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub module: naga::Module,
    pub info: ModuleInfo,
    pub entry_point: String,
    entry_index: usize,
}

/// Both stages compiled and linked, not yet on a device.
#[derive(Debug)]
pub struct CompiledProgram {
    pub name: &'static str,
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    pub interface: ProgramInterface,
}

/// Parse and validate one stage.
pub fn compile_stage(program: &str, stage: ShaderStage, source: &str) -> Result<CompiledStage, ShaderError> {
    let compile_error = |log: String| ShaderError::Compile {
        program: program.to_string(),
        stage,
        log,
    };

    let module = wgsl::parse_str(source).map_err(|e| compile_error(e.emit_to_string(source)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::empty());
    let info = validator
        .validate(&module)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry_index = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == wanted)
        .ok_or_else(|| compile_error(format!("no @{} entry point", stage)))?;
    let entry_point = module.entry_points[entry_index].name.clone();

    Ok(CompiledStage {
        stage,
        module,
        info,
        entry_point,
        entry_index,
    })
}

/// Check that `vertex` and `fragment` fit together and reflect their
/// shared interface.
pub fn link(program: &str, vertex: &CompiledStage, fragment: &CompiledStage) -> Result<ProgramInterface, ShaderError> {
    let link_error = |log: String| ShaderError::Link {
        program: program.to_string(),
        log,
    };

    let vs_entry = &vertex.module.entry_points[vertex.entry_index];
    let fs_entry = &fragment.module.entry_points[fragment.entry_index];

    let mut outputs = BTreeMap::new();
    if let Some(result) = &vs_entry.function.result {
        collect_locations(&vertex.module, result.binding.as_ref(), result.ty, &mut outputs);
    }
    let mut inputs = BTreeMap::new();
    for arg in &fs_entry.function.arguments {
        collect_locations(&fragment.module, arg.binding.as_ref(), arg.ty, &mut inputs);
    }

    for (location, ty) in &inputs {
        match outputs.get(location) {
            None => {
                return Err(link_error(format!(
                    "fragment input at location {} has no matching vertex output",
                    location
                )))
            }
            Some(out) if out != ty => {
                return Err(link_error(format!(
                    "location {} is {:?} in the vertex stage but {:?} in the fragment stage",
                    location, out, ty
                )))
            }
            Some(_) => {}
        }
    }

    let mut vertex_inputs = BTreeMap::new();
    for arg in &vs_entry.function.arguments {
        collect_locations(&vertex.module, arg.binding.as_ref(), arg.ty, &mut vertex_inputs);
    }

    let mut bindings = Vec::new();
    collect_bindings(vertex, &mut bindings).map_err(&link_error)?;
    collect_bindings(fragment, &mut bindings).map_err(&link_error)?;
    bindings.sort_by_key(|b| (b.group, b.binding));

    Ok(ProgramInterface {
        bindings,
        vertex_inputs: vertex_inputs.into_keys().collect(),
        varyings: inputs.into_keys().collect(),
    })
}

/// Compile and link `source` without a device.
pub fn compile_program(source: &ProgramSource) -> Result<CompiledProgram, ShaderError> {
    let vertex = compile_stage(source.name, ShaderStage::Vertex, source.vertex)?;
    let fragment = compile_stage(source.name, ShaderStage::Fragment, source.fragment)?;
    let interface = link(source.name, &vertex, &fragment)?;
    Ok(CompiledProgram {
        name: source.name,
        vertex,
        fragment,
        interface,
    })
}

fn collect_locations(
    module: &naga::Module,
    binding: Option<&naga::Binding>,
    ty: naga::Handle<naga::Type>,
    out: &mut BTreeMap<u32, naga::TypeInner>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location, module.types[ty].inner.clone());
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.binding.as_ref(), member.ty, out);
                }
            }
        }
    }
}

fn collect_bindings(stage: &CompiledStage, out: &mut Vec<BindingInfo>) -> Result<(), String> {
    let module = &stage.module;
    let usage = stage.info.get_entry_point(stage.entry_index);

    for (handle, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else { continue };
        if usage[handle].is_empty() {
            continue;
        }
        let kind = match module.types[var.ty].inner {
            naga::TypeInner::Image { .. } => BindingKind::Texture,
            naga::TypeInner::Sampler { .. } => BindingKind::Sampler,
            _ => match var.space {
                naga::AddressSpace::Uniform => BindingKind::Uniform,
                naga::AddressSpace::Storage { .. } => BindingKind::Storage,
                _ => continue,
            },
        };
        let name = var
            .name
            .clone()
            .unwrap_or_else(|| format!("group{}_binding{}", rb.group, rb.binding));

        match out.iter().find(|b| b.group == rb.group && b.binding == rb.binding) {
            Some(existing) if existing.name != name || existing.kind != kind => {
                return Err(format!(
                    "@group({}) @binding({}) is '{}' ({:?}) in one stage and '{}' ({:?}) in the {} stage",
                    rb.group, rb.binding, existing.name, existing.kind, name, kind, stage.stage
                ));
            }
            Some(_) => {}
            None => out.push(BindingInfo {
                name,
                group: rb.group,
                binding: rb.binding,
                kind,
            }),
        }
    }
    Ok(())
}

/// Bindings of a fullscreen post-processing program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassBindings {
    pub source: u32,
    pub sampler: u32,
    pub params: Option<u32>,
    /// Second input texture, only bound by the bloom composite.
    pub bloom: Option<u32>,
}

impl PassBindings {
    pub fn resolve(program: &str, interface: &ProgramInterface) -> Result<Self, ShaderError> {
        Ok(Self {
            source: interface.require(program, "source_texture", BindingKind::Texture)?,
            sampler: interface.require(program, "source_sampler", BindingKind::Sampler)?,
            params: interface.optional(program, "params", BindingKind::Uniform)?,
            bloom: interface.optional(program, "bloom_texture", BindingKind::Texture)?,
        })
    }
}

/// Bindings of the particle program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleBindings {
    pub params: u32,
}

impl ParticleBindings {
    pub fn resolve(program: &str, interface: &ProgramInterface) -> Result<Self, ShaderError> {
        Ok(Self {
            params: interface.require(program, "params", BindingKind::Uniform)?,
        })
    }
}

/// A linked program living on the device.
#[derive(Debug)]
pub struct Program {
    pub name: &'static str,
    pub pipeline: wgpu::RenderPipeline,
    pub interface: ProgramInterface,
}

/// Fixed-function state for [`create_program`].
#[derive(Debug, Clone)]
pub struct PipelineOptions<'a> {
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

/// Compile, link and create the pipeline for `source`.
///
/// The pipeline layout is derived from the shaders. Device-side validation
/// runs inside an error scope, so a rejected pipeline is reported as a link
/// error instead of reaching the uncaptured error handler.
pub fn create_program(
    device: &wgpu::Device,
    source: &ProgramSource,
    options: &PipelineOptions<'_>,
) -> Result<Program, ShaderError> {
    let compiled = compile_program(source)?;

    for location in &compiled.interface.vertex_inputs {
        let supplied = options
            .vertex_buffers
            .iter()
            .flat_map(|layout| layout.attributes.iter())
            .any(|attr| attr.shader_location == *location);
        if !supplied {
            return Err(ShaderError::Link {
                program: source.name.to_string(),
                log: format!("vertex input at location {} has no buffer attribute", location),
            });
        }
    }

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex_label = format!("{} (vertex)", source.name);
    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&vertex_label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.vertex)),
    });
    let fragment_label = format!("{} (fragment)", source.name);
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&fragment_label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.fragment)),
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(source.name),
        layout: None,
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(&compiled.vertex.entry_point),
            buffers: options.vertex_buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(&compiled.fragment.entry_point),
            targets: &[Some(wgpu::ColorTargetState {
                format: options.format,
                blend: options.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Link {
            program: source.name.to_string(),
            log: error.to_string(),
        });
    }

    log::debug!(
        "Linked program '{}' ({} bindings, {} varyings)",
        source.name,
        compiled.interface.bindings.len(),
        compiled.interface.varyings.len()
    );

    Ok(Program {
        name: source.name,
        pipeline,
        interface: compiled.interface,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders;

    const VS: &str = r#"
struct Out {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};
@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> Out {
    var out: Out;
    out.pos = vec4<f32>(f32(i), 0.0, 0.0, 1.0);
    out.uv = vec2<f32>(0.0);
    return out;
}
"#;

    #[test]
    fn test_compile_error_carries_log() {
        let err = compile_stage("broken", ShaderStage::Vertex, "fn vs_main( {").unwrap_err();
        match &err {
            ShaderError::Compile { program, stage, log } => {
                assert_eq!(program, "broken");
                assert_eq!(*stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_error_is_compile_error() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        let err = compile_stage("typed", ShaderStage::Fragment, src).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Fragment, .. }));
    }

    #[test]
    fn test_missing_entry_point() {
        let err = compile_stage("vs-only", ShaderStage::Fragment, VS).unwrap_err();
        assert!(err.log().contains("fragment"));
    }

    #[test]
    fn test_link_rejects_unmatched_varying() {
        let fs = r#"
@fragment
fn fs_main(@location(3) glow: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(glow);
}
"#;
        let vertex = compile_stage("p", ShaderStage::Vertex, VS).unwrap();
        let fragment = compile_stage("p", ShaderStage::Fragment, fs).unwrap();
        let err = link("p", &vertex, &fragment).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
        assert!(err.log().contains("location 3"));
    }

    #[test]
    fn test_link_rejects_type_mismatch() {
        let fs = r#"
@fragment
fn fs_main(@location(0) uv: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 1.0);
}
"#;
        let vertex = compile_stage("p", ShaderStage::Vertex, VS).unwrap();
        let fragment = compile_stage("p", ShaderStage::Fragment, fs).unwrap();
        assert!(link("p", &vertex, &fragment).is_err());
    }

    #[test]
    fn test_reflects_pass_bindings() {
        let compiled = compile_program(&shaders::BLOOM_COMPOSITE).unwrap();
        let bindings = PassBindings::resolve(compiled.name, &compiled.interface).unwrap();
        assert_eq!(bindings.source, 0);
        assert_eq!(bindings.sampler, 1);
        assert_eq!(bindings.params, Some(2));
        assert_eq!(bindings.bloom, Some(3));
        assert_eq!(compiled.interface.varyings, vec![0]);
    }

    #[test]
    fn test_copy_has_no_params() {
        let compiled = compile_program(&shaders::COPY).unwrap();
        let bindings = PassBindings::resolve(compiled.name, &compiled.interface).unwrap();
        assert_eq!(bindings.params, None);
        assert_eq!(bindings.bloom, None);
    }

    #[test]
    fn test_particle_program_interface() {
        let compiled = compile_program(&shaders::PARTICLE).unwrap();
        assert_eq!(compiled.interface.vertex_inputs, vec![0, 1, 2, 3, 4]);
        assert_eq!(compiled.interface.varyings, vec![0, 1, 2, 3, 4]);
        let bindings = ParticleBindings::resolve(compiled.name, &compiled.interface).unwrap();
        assert_eq!(bindings.params, 0);
    }

    #[test]
    fn test_wrong_binding_kind_is_link_error() {
        let compiled = compile_program(&shaders::BLUR).unwrap();
        let err = compiled
            .interface
            .require("post.blur", "params", BindingKind::Texture)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }
}

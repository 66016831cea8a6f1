//! The post chain on a real device: degraded fallback and recovery, skipped
//! passes and the copy to the surface when the final pass fails.
//!
//! Every test returns early on machines without a usable adapter.

use particle_field::gpu::post_process::{PostProcessor, SCENE_TARGET};
use particle_field::gpu::ResourceRegistry;
use particle_field::ParticleFieldConfig;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const MAX_DIMENSION: u32 = 256;

fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("post chain test"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
        memory_hints: Default::default(),
        trace: wgpu::Trace::Off,
    }))
    .ok()
}

fn output(device: &wgpu::Device) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("test output"),
            size: wgpu::Extent3d {
                width: 128,
                height: 128,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn processor(
    device: &wgpu::Device,
    resources: &mut ResourceRegistry,
    config: &ParticleFieldConfig,
    size: u32,
) -> PostProcessor {
    PostProcessor::new(device, resources, FORMAT, MAX_DIMENSION, &config.post_process, size, size).unwrap()
}

#[test]
fn test_oversized_targets_degrade_then_recover() {
    let Some((device, _queue)) = device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let config = ParticleFieldConfig::default();
    let mut resources = ResourceRegistry::new();

    let mut post = processor(&device, &mut resources, &config, MAX_DIMENSION * 2);
    assert!(post.is_degraded());
    assert!(post.plan(&config).is_direct());
    assert!(resources.framebuffer(SCENE_TARGET).is_none());

    post.resize(&device, &mut resources, 128, 128, config.post_process.bloom_levels)
        .unwrap();
    assert!(!post.is_degraded());
    assert!(!post.plan(&config).is_direct());
    assert!(resources.framebuffer(SCENE_TARGET).is_some());
    assert!(post.bloom_levels() > 0);
}

#[test]
fn test_missing_target_skips_only_that_pass() {
    let Some((device, queue)) = device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let config = ParticleFieldConfig::default();
    let mut resources = ResourceRegistry::new();
    let post = processor(&device, &mut resources, &config, 128);
    post.write_uniforms(&queue, &resources, &config.post_process, 0.0);
    resources.remove_framebuffers("post.bloom.");

    let view = output(&device);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let stats = post.execute(&device, &mut encoder, &resources, &post.plan(&config), &view);
    queue.submit(Some(encoder.finish()));
    assert!(pollster::block_on(device.pop_error_scope()).is_none());

    // Bloom skipped; color correction and composite still ran.
    assert_eq!(stats.skipped_passes, 1);
    assert_eq!(stats.draw_calls, 2);
}

#[test]
fn test_failed_final_pass_copies_last_result() {
    let Some((device, queue)) = device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let mut config = ParticleFieldConfig::default();
    config.post_process.color_correction_enabled = false;
    config.post_process.composite_enabled = false;
    let mut resources = ResourceRegistry::new();
    let post = processor(&device, &mut resources, &config, 128);
    post.write_uniforms(&queue, &resources, &config.post_process, 0.0);
    resources.remove_framebuffers("post.bloom.");

    let plan = post.plan(&config);
    assert_eq!(plan.passes().len(), 1);

    let view = output(&device);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let stats = post.execute(&device, &mut encoder, &resources, &plan, &view);
    queue.submit(Some(encoder.finish()));
    assert!(pollster::block_on(device.pop_error_scope()).is_none());

    // Only the copy of the scene reached the output.
    assert_eq!(stats.skipped_passes, 1);
    assert_eq!(stats.draw_calls, 1);
}

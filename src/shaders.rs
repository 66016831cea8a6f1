//! Built-in WGSL programs.
//!
//! Each program is a separate vertex and fragment source, compiled and
//! linked by [`crate::gpu::program`]. Post-processing passes share the
//! fullscreen-triangle vertex stage.

/// Vertex and fragment source of one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSource {
    pub name: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// Fullscreen triangle with a `uv` varying at location 0.
pub const FULLSCREEN_VERTEX: &str = include_str!("shaders/fullscreen.vert.wgsl");

pub const PARTICLE: ProgramSource = ProgramSource {
    name: "particle",
    vertex: include_str!("shaders/particle.vert.wgsl"),
    fragment: include_str!("shaders/particle.frag.wgsl"),
};

pub const BLUR: ProgramSource = ProgramSource {
    name: "post.blur",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/blur.frag.wgsl"),
};

pub const BLOOM_EXTRACT: ProgramSource = ProgramSource {
    name: "post.bloom.extract",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/bloom_extract.frag.wgsl"),
};

pub const BLOOM_DOWNSAMPLE: ProgramSource = ProgramSource {
    name: "post.bloom.downsample",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/bloom_downsample.frag.wgsl"),
};

pub const BLOOM_UPSAMPLE: ProgramSource = ProgramSource {
    name: "post.bloom.upsample",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/bloom_upsample.frag.wgsl"),
};

pub const BLOOM_COMPOSITE: ProgramSource = ProgramSource {
    name: "post.bloom.composite",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/bloom_composite.frag.wgsl"),
};

pub const COLOR_CORRECTION: ProgramSource = ProgramSource {
    name: "post.color",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/color_correction.frag.wgsl"),
};

pub const FINAL_COMPOSITE: ProgramSource = ProgramSource {
    name: "post.composite",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/final_composite.frag.wgsl"),
};

pub const COPY: ProgramSource = ProgramSource {
    name: "post.copy",
    vertex: FULLSCREEN_VERTEX,
    fragment: include_str!("shaders/copy.frag.wgsl"),
};

/// Every program the renderer builds at start-up.
pub const ALL_PROGRAMS: [ProgramSource; 9] = [
    PARTICLE,
    BLUR,
    BLOOM_EXTRACT,
    BLOOM_DOWNSAMPLE,
    BLOOM_UPSAMPLE,
    BLOOM_COMPOSITE,
    COLOR_CORRECTION,
    FINAL_COMPOSITE,
    COPY,
];

/// Programs used by post-processing passes.
pub const POST_PROGRAMS: [ProgramSource; 8] = [
    BLUR,
    BLOOM_EXTRACT,
    BLOOM_DOWNSAMPLE,
    BLOOM_UPSAMPLE,
    BLOOM_COMPOSITE,
    COLOR_CORRECTION,
    FINAL_COMPOSITE,
    COPY,
];

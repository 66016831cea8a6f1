//! Device capability probe and quality classification.
//!
//! The classifier is a best-effort heuristic over adapter name strings and
//! texture limits. It is not portable: GPU naming is vendor-controlled and
//! changes between drivers. The patterns and cutoffs below are tunable
//! constants, not guaranteed behavior.

use serde::{Deserialize, Serialize};

/// Coarse device tier used to pick a starting quality profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 4] = [
        QualityLevel::Low,
        QualityLevel::Medium,
        QualityLevel::High,
        QualityLevel::Ultra,
    ];

    /// One step lighter, or `None` at the bottom.
    pub fn lower(self) -> Option<Self> {
        match self {
            QualityLevel::Low => None,
            QualityLevel::Medium => Some(QualityLevel::Low),
            QualityLevel::High => Some(QualityLevel::Medium),
            QualityLevel::Ultra => Some(QualityLevel::High),
        }
    }

    /// One step heavier, or `None` at the top.
    pub fn higher(self) -> Option<Self> {
        match self {
            QualityLevel::Low => Some(QualityLevel::Medium),
            QualityLevel::Medium => Some(QualityLevel::High),
            QualityLevel::High => Some(QualityLevel::Ultra),
            QualityLevel::Ultra => None,
        }
    }
}

/// User-agent fragments that mark a mobile device.
pub const MOBILE_AGENT_PATTERNS: &[&str] = &["mobi", "android", "iphone", "ipad", "ipod"];

/// Renderer fragments of mobile GPUs.
pub const MOBILE_GPU_PATTERNS: &[&str] = &["adreno", "mali", "powervr", "apple a", "videocore"];

/// Renderer fragments of integrated GPUs.
pub const INTEGRATED_GPU_PATTERNS: &[&str] = &[
    "intel",
    "iris",
    "uhd graphics",
    "hd graphics",
    "radeon(tm) graphics",
    "radeon vega",
    "llvmpipe",
    "swiftshader",
];

/// Renderer fragments of high-end discrete GPUs.
pub const HIGH_END_GPU_PATTERNS: &[&str] = &[
    "rtx",
    "radeon rx 6",
    "radeon rx 7",
    "radeon rx 9",
    "radeon pro",
    "apple m",
    "quadro",
    "titan",
];

/// Texture size a device needs, in addition to a high-end name, for `Ultra`.
pub const ULTRA_TEXTURE_SIZE: u32 = 16384;

/// Limits and identification strings probed once at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub max_texture_size: u32,
    pub max_uniform_buffer_size: u32,
    pub max_varying_components: u32,
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub backend: String,
    /// Set when the adapter reports itself as integrated or CPU-based.
    pub integrated: bool,
    pub extensions: Vec<String>,
}

impl DeviceCapabilities {
    /// Read limits, names and optional features from `adapter`.
    pub fn probe(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let limits = adapter.limits();
        let features = adapter.features();

        let known: [(wgpu::Features, &str); 8] = [
            (wgpu::Features::TIMESTAMP_QUERY, "timestamp-query"),
            (wgpu::Features::TEXTURE_COMPRESSION_BC, "texture-compression-bc"),
            (wgpu::Features::TEXTURE_COMPRESSION_ETC2, "texture-compression-etc2"),
            (wgpu::Features::TEXTURE_COMPRESSION_ASTC, "texture-compression-astc"),
            (wgpu::Features::DEPTH_CLIP_CONTROL, "depth-clip-control"),
            (wgpu::Features::SHADER_F16, "shader-f16"),
            (wgpu::Features::FLOAT32_FILTERABLE, "float32-filterable"),
            (wgpu::Features::INDIRECT_FIRST_INSTANCE, "indirect-first-instance"),
        ];
        let extensions = known
            .iter()
            .filter(|(feature, _)| features.contains(*feature))
            .map(|(_, name)| name.to_string())
            .collect();

        let capabilities = Self {
            max_texture_size: limits.max_texture_dimension_2d,
            max_uniform_buffer_size: limits.max_uniform_buffer_binding_size,
            max_varying_components: limits.max_inter_stage_shader_components,
            vendor: vendor_name(info.vendor),
            renderer: info.name.clone(),
            version: format!("{} {}", info.driver, info.driver_info).trim().to_string(),
            backend: format!("{:?}", info.backend),
            integrated: matches!(
                info.device_type,
                wgpu::DeviceType::IntegratedGpu | wgpu::DeviceType::Cpu
            ),
            extensions,
        };

        log::info!(
            "Probed GPU: \"{}\" ({}), backend {}, max texture {}",
            capabilities.renderer,
            capabilities.vendor,
            capabilities.backend,
            capabilities.max_texture_size
        );
        capabilities
    }

    /// Classify the device. `user_agent` is optional host context; on native
    /// targets it is usually absent and only the renderer name is used.
    pub fn classify(&self, user_agent: Option<&str>) -> QualityLevel {
        let renderer = self.renderer.to_lowercase();
        let agent = user_agent.map(str::to_lowercase).unwrap_or_default();

        let mobile = MOBILE_AGENT_PATTERNS.iter().any(|p| agent.contains(p))
            || MOBILE_GPU_PATTERNS.iter().any(|p| renderer.contains(p))
            || cfg!(any(target_os = "android", target_os = "ios"));
        if mobile {
            return QualityLevel::Low;
        }

        if self.integrated || INTEGRATED_GPU_PATTERNS.iter().any(|p| renderer.contains(p)) {
            return QualityLevel::Medium;
        }

        if HIGH_END_GPU_PATTERNS.iter().any(|p| renderer.contains(p))
            && self.max_texture_size >= ULTRA_TEXTURE_SIZE
        {
            return QualityLevel::Ultra;
        }

        QualityLevel::High
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }
}

fn vendor_name(pci_id: u32) -> String {
    match pci_id {
        0x10DE => "NVIDIA".into(),
        0x1002 | 0x1022 => "AMD".into(),
        0x8086 => "Intel".into(),
        0x106B => "Apple".into(),
        0x13B5 => "ARM".into(),
        0x5143 => "Qualcomm".into(),
        0x1010 => "Imagination".into(),
        0 => "Unknown".into(),
        other => format!("0x{:04X}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(renderer: &str, max_texture_size: u32) -> DeviceCapabilities {
        DeviceCapabilities {
            renderer: renderer.into(),
            max_texture_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_mobile_user_agent_is_low() {
        let device = caps("NVIDIA GeForce RTX 4090", 32768);
        let ua = "Mozilla/5.0 (Linux; Android 14) Mobile Safari";
        assert_eq!(device.classify(Some(ua)), QualityLevel::Low);
    }

    #[test]
    fn test_mobile_gpu_name_is_low() {
        assert_eq!(caps("Adreno (TM) 740", 16384).classify(None), QualityLevel::Low);
    }

    #[test]
    fn test_integrated_is_medium() {
        assert_eq!(
            caps("Intel(R) Iris(R) Xe Graphics", 16384).classify(None),
            QualityLevel::Medium
        );
        let mut flagged = caps("Some GPU", 8192);
        flagged.integrated = true;
        assert_eq!(flagged.classify(None), QualityLevel::Medium);
    }

    #[test]
    fn test_high_end_needs_texture_limit() {
        assert_eq!(
            caps("NVIDIA GeForce RTX 3080", 32768).classify(None),
            QualityLevel::Ultra
        );
        assert_eq!(
            caps("NVIDIA GeForce RTX 3080", 8192).classify(None),
            QualityLevel::High
        );
    }

    #[test]
    fn test_unknown_is_high() {
        assert_eq!(caps("Mystery Accelerator", 16384).classify(None), QualityLevel::High);
    }

    #[test]
    fn test_quality_steps() {
        assert_eq!(QualityLevel::Low.lower(), None);
        assert_eq!(QualityLevel::Ultra.higher(), None);
        assert_eq!(QualityLevel::High.lower(), Some(QualityLevel::Medium));
        assert_eq!(QualityLevel::Medium.higher(), Some(QualityLevel::High));
        assert!(QualityLevel::Low < QualityLevel::Ultra);
    }

    #[test]
    fn test_vendor_names() {
        assert_eq!(vendor_name(0x10DE), "NVIDIA");
        assert_eq!(vendor_name(0xABCD), "0xABCD");
    }
}

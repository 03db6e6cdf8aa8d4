//! WGSL source of the chunk culling kernel.

use crate::config::CullingSettings;

const TEMPLATE: &str = include_str!("../../shaders/chunk_cull.wgsl");

/// Kernel source specialized for the configured group size and entry point.
///
/// wgpu 0.19 has no pipeline-overridable constants, so the workgroup size
/// is substituted into the source text.
#[must_use]
pub fn kernel_source(settings: &CullingSettings) -> String {
    TEMPLATE
        .replace("{{GROUP_SIZE}}", &settings.group_size.to_string())
        .replace("{{ENTRY_POINT}}", &settings.kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_substituted() {
        let settings = CullingSettings {
            group_size: 128,
            kernel: "cull_grass".to_string(),
            ..CullingSettings::default()
        };
        let source = kernel_source(&settings);
        assert!(source.contains("@workgroup_size(128, 1, 1)"));
        assert!(source.contains("fn cull_grass("));
        assert!(!source.contains("{{"));
    }
}

//! Shared GPU types and utilities used by the tile renderer.

use bytemuck::{Pod, Zeroable};

use crate::coords::ViewportState;

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── view uniform ──────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(super) struct ViewUniform {
    /// xy: world-to-NDC scale, zw: cos/sin of the rotation.
    pub params: [f32; 4],
}

impl ViewUniform {
    pub(super) fn from_viewport(vp: &ViewportState) -> Self {
        let half_w = (vp.resolution * vp.width * 0.5).max(f64::MIN_POSITIVE);
        let half_h = (vp.resolution * vp.height * 0.5).max(f64::MIN_POSITIVE);
        let (sin, cos) = vp.rotation.sin_cos();
        Self {
            params: [(1.0 / half_w) as f32, (1.0 / half_h) as f32, cos as f32, sin as f32],
        }
    }
}

/// Returns the `wgpu` minimum binding size for the view uniform buffer.
///
/// `ViewUniform` is 16 bytes, so the size is non-zero by construction.
pub(super) fn view_ubo_min_binding_size() -> std::num::NonZeroU64 {
    std::num::NonZeroU64::new(std::mem::size_of::<ViewUniform>() as u64)
        .expect("ViewUniform has non-zero size by construction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;

    #[test]
    fn view_uniform_maps_half_extent_to_ndc_edge() {
        let vp = ViewportState::new(Vec2::zero(), 2.0, 100.0, 50.0);
        let u = ViewUniform::from_viewport(&vp);
        // half extent: 100 x 50 world units
        assert!((u.params[0] * 100.0 - 1.0).abs() < 1e-6);
        assert!((u.params[1] * 50.0 - 1.0).abs() < 1e-6);
        assert_eq!(u.params[2], 1.0);
        assert_eq!(u.params[3], 0.0);
    }
}

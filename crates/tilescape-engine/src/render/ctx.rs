use crate::coords::ViewportState;
use crate::paint::Color;

/// Borrowed GPU handles plus the viewport of the frame being drawn.
///
/// The host owns the device and surface; renderers only borrow them for one
/// frame.
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
    pub viewport: ViewportState,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        viewport: ViewportState,
    ) -> Self {
        Self { device, queue, surface_format, viewport }
    }
}

/// Encoder and color view a map layer draws into.
///
/// Layers normally draw over what is already in the view (`clear: None`), so
/// several layers can share one target. The bottom layer may clear it first.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
    pub clear: Option<Color>,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view, clear: None }
    }

    /// Clears the view to `color` before drawing.
    #[inline]
    pub fn with_clear(self, color: Color) -> Self {
        Self { clear: Some(color), ..self }
    }

    pub(super) fn load_op(&self) -> wgpu::LoadOp<wgpu::Color> {
        load_op(self.clear)
    }
}

fn load_op(clear: Option<Color>) -> wgpu::LoadOp<wgpu::Color> {
    match clear {
        // Premultiplied already, matching the blend state.
        Some(c) => wgpu::LoadOp::Clear(wgpu::Color { r: c.r as f64, g: c.g as f64, b: c.b as f64, a: c.a as f64 }),
        None => wgpu::LoadOp::Load,
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use tilescape_tess::MeshBuffers;

use crate::coords::{Extent, Vec2};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique texture identity. Renderers key their GPU uploads on it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(u64);

/// Decoded image shared between texture caches and renderers.
///
/// Cloning is cheap and keeps the same [`TextureId`], so a renderer uploads a
/// given texture once no matter how many meshes reference it.
#[derive(Debug, Clone)]
pub struct Texture {
    id: TextureId,
    image: Arc<RgbaImage>,
}

impl Texture {
    pub fn new(image: Arc<RgbaImage>) -> Self {
        let id = TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed));
        Self { id, image }
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Texture-space sub-rectangle sampled by a textured quad.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl UvRect {
    #[inline]
    pub const fn full() -> Self {
        Self { min: [0.0, 0.0], max: [1.0, 1.0] }
    }

    /// Shrinks the rect by `inset` texels on every side of a `size`-texel image.
    pub fn inset(inset: u32, size: [u32; 2]) -> Self {
        if inset == 0 || size[0] <= 2 * inset || size[1] <= 2 * inset {
            return Self::full();
        }
        let u = inset as f32 / size[0] as f32;
        let v = inset as f32 / size[1] as f32;
        Self { min: [u, v], max: [1.0 - u, 1.0 - v] }
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::full()
    }
}

/// Mesh geometry in tile-local unit space (`[0, 1]²`, y-up).
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Nothing to draw (a loaded tile without content).
    Empty,
    /// Unit quad sampling `texture`. Texture row 0 maps to the top edge.
    TexturedQuad { texture: Texture, uv: UvRect },
    /// Fill triangles plus stroke segments.
    Vector(MeshBuffers),
}

/// Placement of a unit-space mesh in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self { position: Vec2::zero(), scale: Vec2::new(1.0, 1.0) }
    }

    /// Maps the unit square onto `extent`.
    #[inline]
    pub fn from_extent(extent: Extent) -> Self {
        Self {
            position: extent.min(),
            scale: Vec2::new(extent.width(), extent.height()),
        }
    }

    #[inline]
    pub fn apply(self, local: Vec2) -> Vec2 {
        Vec2::new(
            self.position.x + local.x * self.scale.x,
            self.position.y + local.y * self.scale.y,
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// A renderable tile mesh: geometry plus material opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMesh {
    pub geometry: Geometry,
    /// Material opacity in `[0, 1]`, multiplied into every fragment.
    pub opacity: f32,
}

impl TileMesh {
    #[inline]
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, opacity: 1.0 }
    }

    #[inline]
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self { opacity: opacity.clamp(0.0, 1.0), ..self }
    }
}

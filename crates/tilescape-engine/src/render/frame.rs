use std::collections::HashSet;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::coords::Vec2;
use crate::scene::{Geometry, MeshNode, Texture, TextureId, Transform, UvRect};

/// Vertex shared by textured quads, fills and lines.
///
/// `pos` is in world units relative to the view center. `color` is
/// premultiplied and already carries the mesh opacity.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TileVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl TileVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2, // uv
        2 => Float32x4  // color
    ];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// What a batch binds when it is drawn.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BatchKind {
    /// Indexed triangles sampling an uploaded texture.
    Textured(TextureId),
    /// Indexed triangles with vertex colors only.
    Fill,
    /// Line list with vertex colors.
    Lines,
}

/// One draw call. `range` indexes `indices` for triangle batches and
/// `line_vertices` for line batches.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    pub kind: BatchKind,
    pub range: Range<u32>,
}

/// CPU-side vertex streams for one frame, in paint order.
///
/// Consecutive draws of the same kind are merged into one batch (a run of
/// quads sharing a texture is one draw). Buffers are reused across frames.
#[derive(Debug, Default)]
pub struct FrameGeometry {
    pub vertices: Vec<TileVertex>,
    pub indices: Vec<u32>,
    pub line_vertices: Vec<TileVertex>,
    pub batches: Vec<DrawBatch>,
    /// Distinct textures referenced this frame, in first-use order.
    pub textures: Vec<Texture>,

    seen: HashSet<TextureId>,
}

impl FrameGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.line_vertices.clear();
        self.batches.clear();
        self.textures.clear();
        self.seen.clear();
    }

    /// Rebuilds the streams from `nodes` (expected back-to-front).
    ///
    /// Fully transparent and empty meshes produce no draws.
    pub fn build<'a>(&mut self, nodes: impl IntoIterator<Item = &'a MeshNode>, center: Vec2) {
        self.clear();

        for node in nodes {
            let opacity = node.mesh.opacity.clamp(0.0, 1.0);
            if opacity <= 0.0 {
                continue;
            }

            match &node.mesh.geometry {
                Geometry::Empty => {}
                Geometry::TexturedQuad { texture, uv } => {
                    self.push_quad(texture, *uv, node.transform, center, opacity);
                }
                Geometry::Vector(buffers) => {
                    self.push_fill(buffers, node.transform, center, opacity);
                    self.push_lines(buffers, node.transform, center, opacity);
                }
            }
        }
    }

    fn push_quad(&mut self, texture: &Texture, uv: UvRect, transform: Transform, center: Vec2, opacity: f32) {
        if self.seen.insert(texture.id()) {
            self.textures.push(texture.clone());
        }

        let color = [opacity; 4];
        let base = self.vertices.len() as u32;
        // Texture row 0 is the top edge: local y = 1 samples v = uv.min.
        let corners = [
            ([0.0, 0.0], [uv.min[0], uv.max[1]]),
            ([1.0, 0.0], [uv.max[0], uv.max[1]]),
            ([1.0, 1.0], [uv.max[0], uv.min[1]]),
            ([0.0, 1.0], [uv.min[0], uv.min[1]]),
        ];
        for (local, uv) in corners {
            let pos = to_view(transform, center, local[0], local[1]);
            self.vertices.push(TileVertex { pos, uv, color });
        }

        let start = self.indices.len() as u32;
        self.indices.extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
        self.push_batch(BatchKind::Textured(texture.id()), start..self.indices.len() as u32);
    }

    fn push_fill(&mut self, buffers: &tilescape_tess::MeshBuffers, transform: Transform, center: Vec2, opacity: f32) {
        if buffers.indices.is_empty() {
            return;
        }

        let base = self.vertices.len() as u32;
        for (i, p) in buffers.positions.iter().enumerate() {
            let color = buffers.colors.get(i).copied().unwrap_or([0.0; 4]).map(|c| c * opacity);
            let uv = buffers.uvs.get(i).copied().unwrap_or([0.0; 2]);
            let pos = to_view(transform, center, p[0] as f64, p[1] as f64);
            self.vertices.push(TileVertex { pos, uv, color });
        }

        let start = self.indices.len() as u32;
        self.indices.extend(buffers.indices.iter().map(|&i| base + i));
        self.push_batch(BatchKind::Fill, start..self.indices.len() as u32);
    }

    fn push_lines(&mut self, buffers: &tilescape_tess::MeshBuffers, transform: Transform, center: Vec2, opacity: f32) {
        if buffers.line_positions.is_empty() {
            return;
        }

        let start = self.line_vertices.len() as u32;
        for (i, p) in buffers.line_positions.iter().enumerate() {
            let color = buffers.line_colors.get(i).copied().unwrap_or([0.0; 4]).map(|c| c * opacity);
            let pos = to_view(transform, center, p[0] as f64, p[1] as f64);
            self.line_vertices.push(TileVertex { pos, uv: [0.0, 0.0], color });
        }
        self.push_batch(BatchKind::Lines, start..self.line_vertices.len() as u32);
    }

    fn push_batch(&mut self, kind: BatchKind, range: Range<u32>) {
        if let Some(last) = self.batches.last_mut() {
            if last.kind == kind && last.range.end == range.start {
                last.range.end = range.end;
                return;
            }
        }
        self.batches.push(DrawBatch { kind, range });
    }
}

/// Tile-local → world → view-relative. The subtraction happens in f64 so large
/// world coordinates keep their precision after narrowing.
#[inline]
fn to_view(transform: Transform, center: Vec2, x: f64, y: f64) -> [f32; 2] {
    let world = transform.apply(Vec2::new(x, y));
    [(world.x - center.x) as f32, (world.y - center.y) as f32]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::RgbaImage;
    use tilescape_tess::{tessellate_polygons, FlatRings, MeshBuffers, PolygonStyle};

    use super::*;
    use crate::coords::Extent;
    use crate::scene::TileMesh;

    fn quad_node(texture: &Texture, extent: Extent, opacity: f32) -> MeshNode {
        MeshNode {
            mesh: TileMesh::new(Geometry::TexturedQuad { texture: texture.clone(), uv: UvRect::full() })
                .with_opacity(opacity),
            transform: Transform::from_extent(extent),
            z: 0,
        }
    }

    fn square_buffers() -> MeshBuffers {
        // Clockwise unit square.
        let coords = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        let mut out = MeshBuffers::new();
        let style = PolygonStyle::new(Some([1.0, 0.0, 0.0, 1.0]), Some([0.0, 0.0, 0.0, 1.0]));
        tessellate_polygons(&mut out, &FlatRings::new(&coords, &[8], 2), &style);
        out
    }

    fn vector_node(extent: Extent) -> MeshNode {
        MeshNode {
            mesh: TileMesh::new(Geometry::Vector(square_buffers())),
            transform: Transform::from_extent(extent),
            z: 0,
        }
    }

    // ── quads ─────────────────────────────────────────────────────────────

    #[test]
    fn quad_is_placed_relative_to_center() {
        let tex = Texture::new(Arc::new(RgbaImage::new(4, 4)));
        let node = quad_node(&tex, Extent::new(100.0, 200.0, 110.0, 210.0), 1.0);

        let mut frame = FrameGeometry::new();
        frame.build([&node], Vec2::new(100.0, 200.0));

        assert_eq!(frame.vertices.len(), 4);
        assert_eq!(frame.vertices[0].pos, [0.0, 0.0]);
        assert_eq!(frame.vertices[2].pos, [10.0, 10.0]);
        // bottom-left samples the bottom texel row
        assert_eq!(frame.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(frame.batches, vec![DrawBatch { kind: BatchKind::Textured(tex.id()), range: 0..6 }]);
        assert_eq!(frame.textures.len(), 1);
    }

    #[test]
    fn opacity_scales_premultiplied_color() {
        let tex = Texture::new(Arc::new(RgbaImage::new(1, 1)));
        let node = quad_node(&tex, Extent::new(0.0, 0.0, 1.0, 1.0), 0.25);

        let mut frame = FrameGeometry::new();
        frame.build([&node], Vec2::zero());
        assert_eq!(frame.vertices[0].color, [0.25; 4]);
    }

    #[test]
    fn transparent_and_empty_meshes_are_skipped() {
        let tex = Texture::new(Arc::new(RgbaImage::new(1, 1)));
        let hidden = quad_node(&tex, Extent::new(0.0, 0.0, 1.0, 1.0), 0.0);
        let empty = MeshNode { mesh: TileMesh::new(Geometry::Empty), transform: Transform::identity(), z: 0 };

        let mut frame = FrameGeometry::new();
        frame.build([&hidden, &empty], Vec2::zero());
        assert!(frame.batches.is_empty());
        assert!(frame.textures.is_empty());
    }

    // ── batching ──────────────────────────────────────────────────────────

    #[test]
    fn same_texture_quads_merge() {
        let tex = Texture::new(Arc::new(RgbaImage::new(1, 1)));
        let a = quad_node(&tex, Extent::new(0.0, 0.0, 1.0, 1.0), 1.0);
        let b = quad_node(&tex, Extent::new(1.0, 0.0, 2.0, 1.0), 1.0);

        let mut frame = FrameGeometry::new();
        frame.build([&a, &b], Vec2::zero());
        assert_eq!(frame.batches.len(), 1);
        assert_eq!(frame.batches[0].range, 0..12);
        assert_eq!(frame.textures.len(), 1);
    }

    #[test]
    fn different_textures_split_batches() {
        let t1 = Texture::new(Arc::new(RgbaImage::new(1, 1)));
        let t2 = Texture::new(Arc::new(RgbaImage::new(1, 1)));
        let a = quad_node(&t1, Extent::new(0.0, 0.0, 1.0, 1.0), 1.0);
        let b = quad_node(&t2, Extent::new(1.0, 0.0, 2.0, 1.0), 1.0);

        let mut frame = FrameGeometry::new();
        frame.build([&a, &b], Vec2::zero());
        assert_eq!(frame.batches.len(), 2);
        assert_eq!(frame.textures.len(), 2);
    }

    #[test]
    fn vector_tiles_offset_indices_and_emit_lines() {
        let a = vector_node(Extent::new(0.0, 0.0, 10.0, 10.0));
        let b = vector_node(Extent::new(10.0, 0.0, 20.0, 10.0));

        let mut frame = FrameGeometry::new();
        frame.build([&a, &b], Vec2::zero());

        // Fills and lines interleave per node: fill, lines, fill, lines.
        let kinds: Vec<_> = frame.batches.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BatchKind::Fill, BatchKind::Lines, BatchKind::Fill, BatchKind::Lines]);

        let second_fill = &frame.batches[2];
        let first_index = frame.indices[second_fill.range.start as usize];
        assert!(first_index >= 4);
        // 3 segments per square, 2 vertices each, 2 tiles
        assert_eq!(frame.line_vertices.len(), 3 * 2 * 2);
        assert!(frame.vertices.iter().all(|v| v.pos[0] >= 0.0 && v.pos[0] <= 20.0));
    }

    #[test]
    fn rebuild_discards_previous_frame() {
        let a = vector_node(Extent::new(0.0, 0.0, 1.0, 1.0));
        let mut frame = FrameGeometry::new();
        frame.build([&a], Vec2::zero());
        frame.build(std::iter::empty(), Vec2::zero());
        assert!(frame.vertices.is_empty());
        assert!(frame.batches.is_empty());
    }
}

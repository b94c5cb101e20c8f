/// Batched output of the tessellator.
///
/// Fill geometry (`positions`, `colors`, `uvs`, `indices`) is an indexed
/// triangle list. Stroke geometry (`line_positions`, `line_colors`) is a
/// non-indexed line list: every two consecutive vertices form one segment.
///
/// All writers only append. A single `MeshBuffers` can therefore collect every
/// feature of a tile into one mesh; ranges written by earlier calls are never
/// touched again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,

    pub line_positions: Vec<[f32; 3]>,
    pub line_colors: Vec<[f32; 4]>,
}

impl MeshBuffers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all buffers. Keeps allocated capacity for reuse.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.uvs.clear();
        self.indices.clear();
        self.line_positions.clear();
        self.line_colors.clear();
    }

    /// Number of fill vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.line_positions.len() / 2
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.line_positions.is_empty()
    }

    /// Appends one fill vertex and returns its index.
    #[inline]
    pub(crate) fn push_vertex(&mut self, p: [f64; 3], color: [f32; 4]) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push([p[0] as f32, p[1] as f32, p[2] as f32]);
        self.colors.push(color);
        self.uvs.push([p[0] as f32, p[1] as f32]);
        index
    }

    #[inline]
    pub(crate) fn push_segment(&mut self, a: [f64; 3], b: [f64; 3], color: [f32; 4]) {
        self.line_positions.push([a[0] as f32, a[1] as f32, a[2] as f32]);
        self.line_positions.push([b[0] as f32, b[1] as f32, b[2] as f32]);
        self.line_colors.push(color);
        self.line_colors.push(color);
    }
}

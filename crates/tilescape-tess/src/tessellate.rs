use core::ops::AddAssign;

use crate::buffers::MeshBuffers;
use crate::ring::{FlatRings, Ring, Winding};

/// Colors applied to a polygon. Either part may be absent.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PolygonStyle {
    pub fill: Option<[f32; 4]>,
    pub stroke: Option<[f32; 4]>,
}

impl PolygonStyle {
    #[inline]
    pub const fn new(fill: Option<[f32; 4]>, stroke: Option<[f32; 4]>) -> Self {
        Self { fill, stroke }
    }
}

/// Counters describing one tessellation call.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TessStats {
    /// Outer boundaries finalized (with or without holes).
    pub polygons: usize,
    pub triangles: usize,
    pub segments: usize,
    /// Rings dropped as malformed: holes with no outer boundary, zero area.
    pub skipped_rings: usize,
    /// Polygons the triangulator rejected. Their strokes are still emitted.
    pub failed_polygons: usize,
}

impl AddAssign for TessStats {
    fn add_assign(&mut self, rhs: Self) {
        self.polygons += rhs.polygons;
        self.triangles += rhs.triangles;
        self.segments += rhs.segments;
        self.skipped_rings += rhs.skipped_rings;
        self.failed_polygons += rhs.failed_polygons;
    }
}

/// Tessellates polygon rings into `out`.
///
/// Rings are classified by winding as they are visited: a clockwise ring
/// opens a new outer boundary (finalizing the previous one), a
/// counter-clockwise ring becomes a hole of the open boundary. Holes with no
/// open boundary and degenerate rings are skipped; sibling rings are still
/// processed.
pub fn tessellate_polygons(
    out: &mut MeshBuffers,
    rings: &FlatRings<'_>,
    style: &PolygonStyle,
) -> TessStats {
    let mut stats = TessStats::default();
    let mut outer: Option<Ring<'_>> = None;
    let mut holes: Vec<Ring<'_>> = Vec::new();

    for ring in rings.iter() {
        match ring.winding() {
            Winding::Clockwise => {
                if let Some(prev) = outer.take() {
                    stats += finalize_polygon(out, prev, &holes, style);
                    holes.clear();
                }
                outer = Some(ring);
            }
            Winding::CounterClockwise if outer.is_some() => holes.push(ring),
            Winding::CounterClockwise => {
                log::debug!("skipping hole ring with no outer boundary ({} points)", ring.len());
                stats.skipped_rings += 1;
            }
            Winding::Degenerate => stats.skipped_rings += 1,
        }
    }

    if let Some(prev) = outer {
        stats += finalize_polygon(out, prev, &holes, style);
    }

    stats
}

/// Emits line segments for each ring or line string, without triangulation.
pub fn tessellate_lines(out: &mut MeshBuffers, lines: &FlatRings<'_>, stroke: [f32; 4]) -> TessStats {
    let mut stats = TessStats::default();
    for line in lines.iter() {
        stats.segments += push_ring_segments(out, line, stroke);
    }
    stats
}

fn finalize_polygon(
    out: &mut MeshBuffers,
    outer: Ring<'_>,
    holes: &[Ring<'_>],
    style: &PolygonStyle,
) -> TessStats {
    let mut stats = TessStats { polygons: 1, ..TessStats::default() };

    if let Some(fill) = style.fill {
        match triangulate(outer, holes) {
            Ok(triangles) => {
                let base = out.vertex_count() as u32;
                for ring in core::iter::once(&outer).chain(holes) {
                    for p in ring.points() {
                        out.push_vertex(p, fill);
                    }
                }
                out.indices.extend(triangles.iter().map(|&i| base + i as u32));
                stats.triangles = triangles.len() / 3;
            }
            Err(err) => {
                log::debug!("triangulation failed ({err}); polygon fill skipped");
                stats.failed_polygons = 1;
            }
        }
    }

    if let Some(stroke) = style.stroke {
        for ring in core::iter::once(&outer).chain(holes) {
            stats.segments += push_ring_segments(out, *ring, stroke);
        }
    }

    stats
}

/// Triangulates `outer` minus `holes`. Returned indices address the points of
/// `outer` followed by the points of each hole, in order.
fn triangulate(outer: Ring<'_>, holes: &[Ring<'_>]) -> Result<Vec<usize>, String> {
    let total = outer.len() + holes.iter().map(Ring::len).sum::<usize>();
    let mut flat = Vec::with_capacity(total * 2);
    let mut hole_starts = Vec::with_capacity(holes.len());

    for p in outer.points() {
        flat.extend_from_slice(&[p[0], p[1]]);
    }
    for hole in holes {
        hole_starts.push(flat.len() / 2);
        for p in hole.points() {
            flat.extend_from_slice(&[p[0], p[1]]);
        }
    }

    earcutr::earcut(&flat, &hole_starts, 2).map_err(|err| format!("{err:?}"))
}

/// Rings are not auto-closed: `n` points give `n - 1` segments.
fn push_ring_segments(out: &mut MeshBuffers, ring: Ring<'_>, color: [f32; 4]) -> usize {
    let n = ring.len();
    for i in 1..n {
        out.push_segment(ring.point(i - 1), ring.point(i), color);
    }
    n.saturating_sub(1)
}

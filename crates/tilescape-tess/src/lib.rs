//! Tessellation of flat ring geometry into GPU-ready buffers.
//!
//! Input is the flat layout vector tile decoders produce: one coordinate
//! array with a fixed stride plus an array of ring end offsets. Output is a
//! [`MeshBuffers`] with an indexed triangle list for fills and a line list for
//! strokes.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`buffers`] | `MeshBuffers` |
//! | [`ring`] | `FlatRings`, `Ring`, `Winding` |
//! | [`tessellate`] | `tessellate_polygons`, `tessellate_lines`, `PolygonStyle`, `TessStats` |
//!
//! # Quick start
//!
//! ```rust
//! use tilescape_tess::{tessellate_polygons, FlatRings, MeshBuffers, PolygonStyle};
//!
//! // Clockwise unit square (y-up).
//! let coords = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
//! let ends = [coords.len()];
//!
//! let mut out = MeshBuffers::new();
//! let style = PolygonStyle::new(Some([0.0, 0.0, 1.0, 0.5]), Some([0.0, 0.0, 1.0, 1.0]));
//! let stats = tessellate_polygons(&mut out, &FlatRings::new(&coords, &ends, 2), &style);
//!
//! assert_eq!(stats.triangles, 2);
//! assert_eq!(out.segment_count(), 3);
//! ```

pub mod buffers;
pub mod ring;
pub mod tessellate;

pub use buffers::MeshBuffers;
pub use ring::{FlatRings, Ring, Winding};
pub use tessellate::{tessellate_lines, tessellate_polygons, PolygonStyle, TessStats};

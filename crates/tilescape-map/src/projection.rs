use std::sync::Arc;

use tilescape_engine::coords::Extent;

/// Half the web-mercator world width in meters.
pub const WEB_MERCATOR_HALF_WORLD: f64 = 20_037_508.342_789_244;

/// Units of a projection's coordinates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Units {
    Meters,
    /// Vector tile pixel space: `[0, extent]²`, +Y down.
    TilePixels,
}

/// Projection descriptor.
///
/// Only identity and validity extent are modeled; two projections are the
/// same if their codes match.
#[derive(Debug, Clone)]
pub struct Projection {
    code: Arc<str>,
    extent: Extent,
    units: Units,
}

impl Projection {
    pub fn new(code: &str, extent: Extent, units: Units) -> Self {
        Self { code: Arc::from(code), extent, units }
    }

    /// EPSG:3857.
    pub fn web_mercator() -> Self {
        let h = WEB_MERCATOR_HALF_WORLD;
        Self::new("EPSG:3857", Extent::new(-h, -h, h, h), Units::Meters)
    }

    /// Pixel space of a vector tile with `extent` pixels per side.
    pub fn tile_pixels(extent: u32) -> Self {
        let e = extent as f64;
        Self::new("tile-pixels", Extent::new(0.0, 0.0, e, e), Units::TilePixels)
    }

    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[inline]
    pub(crate) fn code_arc(&self) -> &Arc<str> {
        &self.code
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn units(&self) -> Units {
        self.units
    }

    #[inline]
    pub fn is_tile_pixels(&self) -> bool {
        self.units == Units::TilePixels
    }
}

impl PartialEq for Projection {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Projection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projections_compare_by_code() {
        let a = Projection::web_mercator();
        let b = Projection::new("EPSG:3857", Extent::new(0.0, 0.0, 1.0, 1.0), Units::Meters);
        assert_eq!(a, b);
        assert_ne!(a, Projection::tile_pixels(4096));
    }

    #[test]
    fn tile_pixel_extent() {
        let p = Projection::tile_pixels(4096);
        assert!(p.is_tile_pixels());
        assert_eq!(p.extent().width(), 4096.0);
    }
}

use super::{Extent, Vec2};

/// Camera state for one frame, passed explicitly into every update.
///
/// `resolution` is world units per (CSS) pixel; `width`/`height` are the
/// viewport size in pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportState {
    pub center: Vec2,
    pub resolution: f64,
    /// Counter-clockwise rotation in radians.
    pub rotation: f64,
    pub width: f64,
    pub height: f64,
    /// Device pixels per CSS pixel.
    pub pixel_ratio: f64,
}

impl ViewportState {
    #[inline]
    pub const fn new(center: Vec2, resolution: f64, width: f64, height: f64) -> Self {
        Self { center, resolution, rotation: 0.0, width, height, pixel_ratio: 1.0 }
    }

    /// Derives the resolution from a perspective camera looking straight down
    /// at its target: the visible world height at `distance` divided by the
    /// viewport height.
    pub fn from_perspective(center: Vec2, distance: f64, fov_y_deg: f64, width: f64, height: f64) -> Self {
        let visible_height = 2.0 * distance * (fov_y_deg.to_radians() * 0.5).tan();
        Self::new(center, visible_height / height, width, height)
    }

    #[inline]
    pub fn with_rotation(self, rotation: f64) -> Self {
        Self { rotation, ..self }
    }

    #[inline]
    pub fn with_pixel_ratio(self, pixel_ratio: f64) -> Self {
        Self { pixel_ratio, ..self }
    }

    /// Positive finite size, resolution and pixel ratio with a finite center
    /// and rotation.
    #[inline]
    pub fn is_valid(&self) -> bool {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        positive(self.width)
            && positive(self.height)
            && positive(self.resolution)
            && positive(self.pixel_ratio)
            && self.rotation.is_finite()
            && self.center.is_finite()
    }

    /// World extent covered by the viewport, including rotation (the bounding
    /// box of the rotated view rectangle).
    pub fn visible_extent(&self) -> Extent {
        let dx = self.resolution * self.width * 0.5;
        let dy = self.resolution * self.height * 0.5;
        let (sin, cos) = self.rotation.sin_cos();

        let corners = [(-dx, -dy), (-dx, dy), (dx, -dy), (dx, dy)].map(|(x, y)| {
            Vec2::new(self.center.x + x * cos - y * sin, self.center.y + x * sin + y * cos)
        });

        // Four corners always exist.
        Extent::from_points(corners).unwrap_or_default()
    }
}

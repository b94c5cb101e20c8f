use super::Vec2;

/// Axis-aligned world rectangle `[min_x, min_y, max_x, max_y]` (y-up).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    #[inline]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Smallest extent containing every point. Returns `None` for no points.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut e = Extent::new(first.x, first.y, first.x, first.y);
        for p in iter {
            e.min_x = e.min_x.min(p.x);
            e.min_y = e.min_y.min(p.y);
            e.max_x = e.max_x.max(p.x);
            e.max_y = e.max_y.max(p.y);
        }
        Some(e)
    }

    #[inline]
    pub fn width(self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(self) -> f64 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        Vec2::new(self.min_x, self.min_y)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.max_x, self.max_y)
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new((self.min_x + self.max_x) * 0.5, (self.min_y + self.max_y) * 0.5)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.min().is_finite() && self.max().is_finite()
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        p.x >= self.min_x && p.y >= self.min_y && p.x < self.max_x && p.y < self.max_y
    }

    #[inline]
    pub fn intersect(self, other: Extent) -> Option<Extent> {
        let e = Extent::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if e.is_empty() { None } else { Some(e) }
    }

    /// Maps a world point into this extent's unit square (`min` → 0, `max` → 1).
    #[inline]
    pub fn to_unit(self, p: Vec2) -> Vec2 {
        Vec2::new((p.x - self.min_x) / self.width(), (p.y - self.min_y) / self.height())
    }
}

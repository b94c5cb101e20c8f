/// Rings whose absolute signed area is at or below this are degenerate.
pub const AREA_EPSILON: f64 = 1e-12;

/// Orientation of a ring in a y-up world.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
    /// Zero (or near-zero) area: collinear points, fewer than three points.
    Degenerate,
}

/// Flat, stride-delimited ring geometry.
///
/// `coords` holds `stride` values per point. `ends` holds, for each ring, the
/// exclusive end offset of that ring into `coords`; ring `i` starts where
/// ring `i - 1` ended (the first ring starts at 0).
#[derive(Debug, Copy, Clone)]
pub struct FlatRings<'a> {
    coords: &'a [f64],
    ends: &'a [usize],
    stride: usize,
}

impl<'a> FlatRings<'a> {
    #[inline]
    pub fn new(coords: &'a [f64], ends: &'a [usize], stride: usize) -> Self {
        Self { coords, ends, stride }
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Iterates rings in array order.
    ///
    /// Ends that step backwards or run past `coords` are clamped, so malformed
    /// offsets yield empty or truncated rings instead of panicking. A stride
    /// below 2 yields nothing.
    pub fn iter(&self) -> impl Iterator<Item = Ring<'a>> + '_ {
        let coords = self.coords;
        let stride = self.stride;
        let mut offset = 0usize;

        self.ends.iter().filter(move |_| stride >= 2).map(move |&end| {
            let end = end.min(coords.len());
            let start = offset.min(end);
            offset = end.max(offset);
            Ring { coords: &coords[start..end], stride }
        })
    }
}

/// One decoded ring (or line string), borrowed from the flat array.
#[derive(Debug, Copy, Clone)]
pub struct Ring<'a> {
    coords: &'a [f64],
    stride: usize,
}

impl<'a> Ring<'a> {
    /// Builds a ring from a flat slice. Trailing values that do not fill a
    /// whole point are ignored.
    #[inline]
    pub fn new(coords: &'a [f64], stride: usize) -> Self {
        Self { coords, stride: stride.max(2) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len() / self.stride
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point `i` as `[x, y, z]`; `z` defaults to 0 for stride 2.
    #[inline]
    pub fn point(&self, i: usize) -> [f64; 3] {
        let p = &self.coords[i * self.stride..(i + 1) * self.stride];
        [p[0], p[1], if self.stride >= 3 { p[2] } else { 0.0 }]
    }

    pub fn points(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }

    /// Signed area from the sum of cross products of consecutive vertices
    /// (shoelace). Positive is counter-clockwise in a y-up world.
    ///
    /// The ring is treated as implicitly closed; an explicit repeat of the
    /// first point contributes a zero term.
    pub fn signed_area(&self) -> f64 {
        let n = self.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for i in 0..n {
            let a = self.point(i);
            let b = self.point((i + 1) % n);
            twice += a[0] * b[1] - b[0] * a[1];
        }
        twice * 0.5
    }

    pub fn winding(&self) -> Winding {
        let area = self.signed_area();
        if area.abs() <= AREA_EPSILON {
            Winding::Degenerate
        } else if area < 0.0 {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        }
    }
}

use std::rc::Rc;

use tilescape_engine::paint::Color;

use super::Feature;

/// Colors for one feature. A polygon may have either part; a line string
/// only uses `stroke`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct StyleSet {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
}

impl StyleSet {
    #[inline]
    pub const fn new(fill: Option<Color>, stroke: Option<Color>) -> Self {
        Self { fill, stroke }
    }

    #[inline]
    pub const fn fill(color: Color) -> Self {
        Self { fill: Some(color), stroke: None }
    }

    #[inline]
    pub const fn stroke(color: Color) -> Self {
        Self { fill: None, stroke: Some(color) }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.fill.is_some_and(|c| c.a > 0.0) || self.stroke.is_some_and(|c| c.a > 0.0)
    }
}

/// `(feature, resolution) -> style`. `None` hides the feature.
pub type StyleFn = Rc<dyn Fn(&Feature, f64) -> Option<StyleSet>>;

use std::fmt;

use super::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles are allowed to have zero height and/or width.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        assert!(width >= 0.0 && height >= 0.0, "negative rectangle size");
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(
            x_center - width / 2.0,
            y_center - height / 2.0,
            width,
            height,
        )
    }

    /// Computes the bounding rectangle that encompasses `points`.
    ///
    /// Points with a non-finite coordinate are ignored. Returns `None` if no finite point remains.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut iter = points
            .into_iter()
            .filter(|[x, y]| x.is_finite() && y.is_finite());

        let [x, y] = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);

        for [x, y] in iter {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Grows each side of this rectangle by a margin relative to its width and height.
    ///
    /// A value of `0.1` adds 10% of the width to the left and right side each, and 10% of the
    /// height to the top and bottom.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        let (cx, cy) = self.center();
        Self::from_center(
            cx,
            cy,
            self.width * (1.0 + 2.0 * amount),
            self.height * (1.0 + 2.0 * amount),
        )
    }

    /// Symmetrically extends one dimension of `self` so that the result has the given aspect
    /// ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let target = target_aspect.as_f32();
        let (cx, cy) = self.center();
        if self.height == 0.0 || self.width / self.height < target {
            Self::from_center(cx, cy, self.height * target, self.height)
        } else {
            Self::from_center(cx, cy, self.width, self.width / target)
        }
    }

    /// Returns the intersection of `self` and `bounds`.
    ///
    /// If the two rectangles don't overlap, an empty rectangle at the nearest edge of `bounds` is
    /// returned.
    #[must_use]
    pub fn clamp_to(&self, bounds: Rect) -> Self {
        let x_min = self.x.clamp(bounds.x, bounds.x + bounds.width);
        let y_min = self.y.clamp(bounds.y, bounds.y + bounds.height);
        let x_max = (self.x + self.width).clamp(x_min, bounds.x + bounds.width);
        let y_max = (self.y + self.height).clamp(y_min, bounds.y + bounds.height);
        Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min)
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({:.1},{:.1})/{:.1}x{:.1}",
            self.x, self.y, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bounding_covers_all_points() {
        let rect = Rect::bounding([[1.0, 5.0], [-2.0, 3.0], [4.0, 4.0]]).unwrap();
        assert_eq!(rect, Rect::from_top_left(-2.0, 3.0, 6.0, 2.0));
        assert!(Rect::bounding([]).is_none());
    }

    #[test]
    fn bounding_ignores_non_finite_points() {
        assert!(Rect::bounding([[f32::NAN, f32::NAN]; 4]).is_none());
        assert!(Rect::bounding([[f32::INFINITY, 0.0], [0.0, f32::NEG_INFINITY]]).is_none());

        let rect = Rect::bounding([[f32::NAN, 1.0], [2.0, 3.0], [4.0, f32::INFINITY], [0.0, 1.0]])
            .unwrap();
        assert_eq!(rect, Rect::from_top_left(0.0, 1.0, 2.0, 2.0));
    }

    #[test]
    fn grow_rel_keeps_center() {
        let rect = Rect::from_top_left(10.0, 10.0, 10.0, 20.0).grow_rel(0.5);
        assert_eq!(rect.center(), (15.0, 20.0));
        assert_relative_eq!(rect.width(), 20.0);
        assert_relative_eq!(rect.height(), 40.0);
    }

    #[test]
    fn grow_to_square() {
        let square = AspectRatio::SQUARE;
        let wide = Rect::from_top_left(0.0, 0.0, 40.0, 20.0).grow_to_fit_aspect(square);
        assert_eq!(wide, Rect::from_top_left(0.0, -10.0, 40.0, 40.0));
        let tall = Rect::from_top_left(0.0, 0.0, 20.0, 40.0).grow_to_fit_aspect(square);
        assert_eq!(tall, Rect::from_top_left(-10.0, 0.0, 40.0, 40.0));
    }

    #[test]
    fn clamp_to_bounds() {
        let bounds = Rect::from_top_left(0.0, 0.0, 100.0, 50.0);
        let rect = Rect::from_top_left(-10.0, 40.0, 30.0, 30.0).clamp_to(bounds);
        assert_eq!(rect, Rect::from_top_left(0.0, 40.0, 20.0, 10.0));

        let outside = Rect::from_top_left(200.0, 200.0, 5.0, 5.0).clamp_to(bounds);
        assert_eq!(outside.width(), 0.0);
        assert_eq!(outside.height(), 0.0);
    }
}

//! Hand-drawn style rendering of polygons onto an overlay [`Image`].
//!
//! Every edge is drawn as two slightly bowed bezier strokes whose control points are randomly
//! displaced, which gives the output a sketched look. The amount of displacement is controlled
//! by [`SketchOptions::roughness`] and [`SketchOptions::bowing`].

use embedded_graphics::{
    prelude::{Point as EgPoint, Primitive},
    primitives::{Line, PrimitiveStyle},
    Drawable,
};
use nalgebra::Vector2;

use crate::{
    image::{Color, Image, Resolution},
    landmark::{BoundingBox, Point},
};

/// Receives the shapes produced by a detection tick.
pub trait Renderer {
    /// Erases everything drawn so far.
    fn clear(&mut self);

    /// Draws the outline of a closed polygon.
    fn draw_polygon(&mut self, points: &[Point]);

    /// Draws the outline of an axis-aligned rectangle.
    fn draw_rectangle(&mut self, bbox: &BoundingBox) {
        self.draw_polygon(&bbox.corners());
    }
}

/// Parameters of the sketch style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SketchOptions {
    /// Scales the random displacement of stroke points. `0.0` draws straight lines.
    pub roughness: f32,
    /// How much strokes curve away from the straight connection of their endpoints.
    pub bowing: f32,
    /// Upper bound of the random displacement, in pixels, before `roughness` is applied.
    pub max_offset: f32,
    pub stroke: Color,
    pub stroke_width: u32,
    /// Seed of the random number generator driving the displacement.
    pub seed: u64,
}

impl Default for SketchOptions {
    fn default() -> Self {
        Self {
            roughness: 1.0,
            bowing: 1.0,
            max_offset: 2.0,
            stroke: Color::BLACK,
            stroke_width: 1,
            seed: 0x5eed,
        }
    }
}

/// A [`Renderer`] that sketches onto a transparent RGBA surface.
pub struct RoughCanvas {
    surface: Image,
    options: SketchOptions,
    rng: fastrand::Rng,
}

impl RoughCanvas {
    pub fn new(res: Resolution, options: SketchOptions) -> Self {
        Self {
            surface: Image::new(res.width(), res.height()),
            rng: fastrand::Rng::with_seed(options.seed),
            options,
        }
    }

    #[inline]
    pub fn surface(&self) -> &Image {
        &self.surface
    }

    /// Changes the size of the drawing surface. The surface is cleared if the size changes.
    pub fn resize(&mut self, res: Resolution) {
        if self.surface.resolution() != res {
            log::debug!("resizing sketch surface to {res}");
            self.surface = Image::new(res.width(), res.height());
        }
    }

    fn offset(&mut self, max: f32, gain: f32) -> f32 {
        self.options.roughness * gain * (self.rng.f32() * 2.0 * max - max)
    }

    /// Draws one rough stroke from `a` to `b`. The `overlay` stroke uses half the displacement.
    fn stroke(&mut self, a: Vector2<f32>, b: Vector2<f32>, overlay: bool) {
        let d = b - a;
        let length = d.norm();
        if !length.is_finite() {
            return;
        }
        let gain = if length < 200.0 {
            1.0
        } else if length > 500.0 {
            0.4
        } else {
            -0.0016668 * length + 1.233334
        };

        let mut offset = self.options.max_offset;
        if offset * offset * 100.0 > length * length {
            offset = length / 10.0;
        }
        let jitter = if overlay { offset / 2.0 } else { offset };
        let diverge = 0.2 + self.rng.f32() * 0.2;

        // Perpendicular to the stroke direction.
        let bow = Vector2::new(d.y, -d.x) * (self.options.bowing * self.options.max_offset / 200.0);
        let bow = Vector2::new(self.offset(bow.x, gain), self.offset(bow.y, gain));

        let rand = |canvas: &mut Self| {
            Vector2::new(canvas.offset(jitter, gain), canvas.offset(jitter, gain))
        };
        let p0 = a + rand(self);
        let p1 = bow + a + d * diverge + rand(self);
        let p2 = bow + a + d * (2.0 * diverge) + rand(self);
        let p3 = b + rand(self);

        let steps = (length / 4.0).ceil().clamp(2.0, 32.0) as u32;
        let mut prev = p0;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let next = cubic_bezier(p0, p1, p2, p3, t);
            self.segment(prev, next);
            prev = next;
        }
    }

    fn segment(&mut self, a: Vector2<f32>, b: Vector2<f32>) {
        let style = PrimitiveStyle::with_stroke(self.options.stroke, self.options.stroke_width);
        match Line::new(to_eg(a), to_eg(b))
            .into_styled(style)
            .draw(&mut self.surface)
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

impl Renderer for RoughCanvas {
    fn clear(&mut self) {
        self.surface.clear(Color::NONE);
    }

    fn draw_polygon(&mut self, points: &[Point]) {
        if points.len() < 2 {
            return;
        }
        // A two-point polygon is a single line, not a closed loop.
        let edges = if points.len() == 2 { 1 } else { points.len() };
        for i in 0..edges {
            let (a, b) = (&points[i], &points[(i + 1) % points.len()]);
            let (a, b) = (Vector2::new(a.x, a.y), Vector2::new(b.x, b.y));
            self.stroke(a, b, false);
            self.stroke(a, b, true);
        }
    }
}

fn cubic_bezier(
    p0: Vector2<f32>,
    p1: Vector2<f32>,
    p2: Vector2<f32>,
    p3: Vector2<f32>,
    t: f32,
) -> Vector2<f32> {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

fn to_eg(v: Vector2<f32>) -> EgPoint {
    EgPoint::new(v.x.round() as i32, v.y.round() as i32)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn triangle() -> [Point; 3] {
        [
            Point::new(20.0, 20.0),
            Point::new(60.0, 25.0),
            Point::new(35.0, 70.0),
        ]
    }

    fn canvas(options: SketchOptions) -> RoughCanvas {
        RoughCanvas::new(Resolution::new(100, 100), options)
    }

    #[test]
    fn same_seed_draws_same_sketch() {
        let mut a = canvas(SketchOptions::default());
        let mut b = canvas(SketchOptions::default());
        a.draw_polygon(&triangle());
        b.draw_polygon(&triangle());
        assert!(!a.surface().is_filled_with(Color::NONE));
        assert!(a.surface() == b.surface());

        let mut c = canvas(SketchOptions {
            seed: 1234,
            ..SketchOptions::default()
        });
        c.draw_polygon(&triangle());
        assert!(a.surface() != c.surface());
    }

    #[test]
    fn strokes_stay_near_the_outline() {
        let mut canvas = canvas(SketchOptions::default());
        canvas.draw_polygon(&triangle());
        let surface = canvas.surface();
        for y in 0..surface.height() {
            for x in 0..surface.width() {
                if surface.get(x, y) == Color::NONE {
                    continue;
                }
                // Maximum displacement is a few pixels for edges of this length.
                assert!(
                    (12..=68).contains(&x) && (12..=78).contains(&y),
                    "stray pixel at {x},{y}"
                );
            }
        }
        // The interior stays empty.
        assert_eq!(surface.get(38, 38), Color::NONE);
    }

    #[test]
    fn zero_roughness_is_straight() {
        let mut canvas = canvas(SketchOptions {
            roughness: 0.0,
            ..SketchOptions::default()
        });
        canvas.draw_polygon(&[Point::new(10.0, 50.0), Point::new(90.0, 50.0)]);
        let surface = canvas.surface();
        for x in 10..=90 {
            assert_eq!(surface.get(x, 50), Color::BLACK, "gap at x={x}");
        }
        assert!((0..100).all(|x| surface.get(x, 49) == Color::NONE));
    }

    #[test]
    fn rectangle_uses_corners() {
        let mut canvas = canvas(SketchOptions {
            roughness: 0.0,
            stroke: Color::RED,
            ..SketchOptions::default()
        });
        canvas.draw_rectangle(&BoundingBox {
            x_min: 10.0,
            y_min: 10.0,
            width: 50.0,
            height: 30.0,
        });
        let surface = canvas.surface();
        assert_eq!(surface.get(10, 10), Color::RED);
        assert_eq!(surface.get(60, 40), Color::RED);
        assert_eq!(surface.get(35, 10), Color::RED);
        assert_eq!(surface.get(35, 25), Color::NONE);
    }

    #[test]
    fn clear_and_resize() {
        let mut canvas = canvas(SketchOptions::default());
        canvas.draw_polygon(&triangle());
        canvas.clear();
        assert!(canvas.surface().is_filled_with(Color::NONE));

        canvas.draw_polygon(&triangle());
        canvas.resize(Resolution::new(100, 100));
        assert!(!canvas.surface().is_filled_with(Color::NONE));
        canvas.resize(Resolution::new(50, 40));
        assert_eq!(canvas.surface().resolution(), Resolution::new(50, 40));
        assert!(canvas.surface().is_filled_with(Color::NONE));
    }

    #[test]
    fn degenerate_input_draws_nothing() {
        let mut canvas = canvas(SketchOptions::default());
        canvas.draw_polygon(&[]);
        canvas.draw_polygon(&[Point::new(5.0, 5.0)]);
        canvas.draw_polygon(&[Point::new(f32::NAN, 5.0), Point::new(5.0, 5.0)]);
        assert!(canvas.surface().is_filled_with(Color::NONE));
    }

    #[test]
    fn bezier_endpoints() {
        let p = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 2.0),
            Vector2::new(3.0, 2.0),
            Vector2::new(4.0, 0.0),
        ];
        assert_relative_eq!(cubic_bezier(p[0], p[1], p[2], p[3], 0.0), p[0]);
        assert_relative_eq!(cubic_bezier(p[0], p[1], p[2], p[3], 1.0), p[3]);
        assert_relative_eq!(cubic_bezier(p[0], p[1], p[2], p[3], 0.5), Vector2::new(2.0, 1.5));
    }
}

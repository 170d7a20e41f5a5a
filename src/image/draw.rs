//! Text drawing.
//!
//! [`text`] returns a guard object that allows customizing the drawn text. The text is drawn
//! when the guard is dropped.

use embedded_graphics::{
    mono_font::{ascii, MonoTextStyle},
    prelude::*,
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use super::{Color, Image};

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&ascii::FONT_7X13, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(
            self.text,
            Point::new(self.x, self.y),
            character_style,
            text_style,
        )
        .draw(&mut *self.image)
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn text<'a>(image: &'a mut Image, x: f32, y: f32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x: x.round() as i32,
        y: y.round() as i32,
        text,
        color: Color::RED,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_draws_something() {
        let mut image = Image::new(80, 20);
        text(&mut image, 40.0, 10.0, "hi").color(Color::WHITE);
        assert!(!image.is_filled_with(Color::NONE));
    }

    #[test]
    fn left_top_aligned_text_starts_at_anchor() {
        let mut image = Image::new(80, 40);
        text(&mut image, 10.0, 20.0, "Model loaded")
            .align_left()
            .align_top()
            .color(Color::WHITE);
        for y in 0..image.height() {
            for x in 0..image.width() {
                if image.get(x, y) != Color::NONE {
                    assert!(x >= 10 && y >= 20, "pixel at {x},{y}");
                }
            }
        }
    }

    #[test]
    fn text_outside_image_is_clipped() {
        let mut image = Image::new(4, 4);
        text(&mut image, -100.0, -100.0, "gone").color(Color::WHITE);
        assert!(image.is_filled_with(Color::NONE));
    }
}

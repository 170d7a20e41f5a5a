use super::{Color, Image};

/// Describes how to combine overlay pixels with the pixels underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// All destination pixels will be overwritten with the corresponding source pixel.
    Overwrite,

    /// Performs alpha blending between source and destination pixels to make the source image
    /// appear in front of the destination image.
    Alpha,
}

pub(super) fn blend(dest: &mut Image, src: &Image, mode: BlendMode) {
    let same_size = dest.resolution() == src.resolution();
    for dest_y in 0..dest.height() {
        for dest_x in 0..dest.width() {
            let src_pix = if same_size {
                src.get(dest_x, dest_y)
            } else {
                let src_x =
                    ((dest_x as f32 + 0.5) / dest.width() as f32 * src.width() as f32) as u32;
                let src_y =
                    ((dest_y as f32 + 0.5) / dest.height() as f32 * src.height() as f32) as u32;
                src.get(src_x.min(src.width() - 1), src_y.min(src.height() - 1))
            };

            let result = match mode {
                BlendMode::Overwrite => src_pix,
                BlendMode::Alpha => match src_pix.a() {
                    // The overlay is mostly empty, so skip the float math where possible.
                    0 => continue,
                    255 => src_pix,
                    _ => blend_alpha(dest.get(dest_x, dest_y), src_pix),
                },
            };
            dest.set(dest_x, dest_y, result);
        }
    }
}

fn blend_alpha(dest: Color, src: Color) -> Color {
    fn blend_color(dest: f32, src: f32, dest_alpha: f32, src_alpha: f32, result_alpha: f32) -> f32 {
        (src * src_alpha + dest * dest_alpha * (1.0 - src_alpha)) / result_alpha
    }

    let dest = LinearColor::new(dest);
    let src = LinearColor::new(src);

    let result_alpha = src.a() + dest.a() * (1.0 - src.a());
    if result_alpha <= 0.0 {
        return Color::NONE;
    }
    let r = blend_color(dest.r(), src.r(), dest.a(), src.a(), result_alpha);
    let g = blend_color(dest.g(), src.g(), dest.a(), src.a(), result_alpha);
    let b = blend_color(dest.b(), src.b(), dest.a(), src.a(), result_alpha);

    LinearColor([r, g, b, result_alpha]).to_color()
}

struct LinearColor([f32; 4]);

impl LinearColor {
    fn new(color: Color) -> Self {
        fn to_linear(srgb: u8) -> f32 {
            let srgb = f32::from(srgb) / 255.0;
            if srgb <= 0.04045 {
                srgb / 12.92
            } else {
                ((srgb + 0.055) / 1.055).powf(2.4)
            }
        }

        Self([
            to_linear(color.r()),
            to_linear(color.g()),
            to_linear(color.b()),
            f32::from(color.a()) / 255.0,
        ])
    }

    fn to_color(&self) -> Color {
        fn to_srgb(linear: f32) -> u8 {
            let srgb = if linear <= 0.0031308 {
                linear * 12.92
            } else {
                1.055 * linear.powf(1.0 / 2.4) - 0.055
            };
            (srgb * 255.0).round().clamp(0.0, 255.0) as u8
        }

        Color([
            to_srgb(self.r()),
            to_srgb(self.g()),
            to_srgb(self.b()),
            (self.a() * 255.0).round().clamp(0.0, 255.0) as u8,
        ])
    }

    fn r(&self) -> f32 {
        self.0[0]
    }

    fn g(&self) -> f32 {
        self.0[1]
    }

    fn b(&self) -> f32 {
        self.0[2]
    }

    fn a(&self) -> f32 {
        self.0[3]
    }
}

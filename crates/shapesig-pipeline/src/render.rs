//! Raster previews of pipeline intermediates: the binary mask and the
//! traced contour.

use image::Rgba;
use tiny_skia::{Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::types::{BinaryMask, Contour, Dimensions, RgbaImage};

/// Stroke width of the contour overlay, in pixels.
pub const OVERLAY_LINE_WIDTH: f32 = 2.0;

/// Overlay stroke color.
pub const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Render a mask as an opaque image: foreground white, background black.
#[must_use]
pub fn mask_image(mask: &BinaryMask) -> RgbaImage {
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get(x, y) { WHITE } else { BLACK }
    })
}

/// Render a contour as a closed green anti-aliased stroke on an opaque
/// black canvas of the given size.
///
/// Points are placed at pixel centers. A one-point contour becomes a dot;
/// an empty contour leaves the canvas black.
#[must_use]
pub fn contour_overlay(contour: &Contour, dimensions: Dimensions) -> RgbaImage {
    let Dimensions { width, height } = dimensions;
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        // Zero-area canvas.
        return RgbaImage::from_pixel(width, height, BLACK);
    };
    pixmap.fill(Color::BLACK);

    let mut paint = Paint::default();
    let [r, g, b] = OVERLAY_COLOR;
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;

    #[allow(clippy::cast_precision_loss)]
    let center = |v: u32| v as f32 + 0.5;
    let points = contour.points();

    match points {
        [] => {}
        [p] => {
            if let Some(dot) =
                PathBuilder::from_circle(center(p.x), center(p.y), OVERLAY_LINE_WIDTH / 2.0)
            {
                pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }
        [first, rest @ ..] => {
            let mut pb = PathBuilder::new();
            pb.move_to(center(first.x), center(first.y));
            for p in rest {
                pb.line_to(center(p.x), center(p.y));
            }
            pb.close();
            if let Some(path) = pb.finish() {
                let stroke = Stroke {
                    width: OVERLAY_LINE_WIDTH,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }

    // Every pixel is opaque, so premultiplied and straight RGBA agree.
    RgbaImage::from_raw(width, height, pixmap.take())
        .unwrap_or_else(|| RgbaImage::from_pixel(width, height, BLACK))
}

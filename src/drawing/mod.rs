pub mod font;
pub mod style;

use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::config::Config;
use crate::models::Detection;
use font::LabelFont;
pub use style::{DrawStyle, resolve_style};

/// Draw person boxes and confidence labels onto a copy of `image`.
///
/// Detections are drawn in order, so later boxes cover earlier ones.
/// Boxes are not clipped to the image; only the label is kept from
/// rising above the top edge.
pub fn annotate(image: &RgbImage, detections: &[Detection], config: &Config) -> RgbImage {
    let mut canvas = image.clone();
    if detections.is_empty() {
        return canvas;
    }

    let style = resolve_style(config, image.height());
    let font = LabelFont::acquire(style.font_px, config.drawing.font_path().as_deref());

    for det in detections {
        draw_box(&mut canvas, det, &style);
        draw_label(&mut canvas, det, &style, &font);
    }

    canvas
}

/// Outline the box with `box_thickness` concentric rectangles, growing
/// outward. Rings past the larger image side are not drawn.
fn draw_box(canvas: &mut RgbImage, det: &Detection, style: &DrawStyle) {
    let rings = style.box_thickness.min(canvas.width().max(canvas.height()));

    for t in 0..i64::from(rings) {
        let Some(rect) = rect_from_i64(
            i64::from(det.x0) - t,
            i64::from(det.y0) - t,
            (i64::from(det.x1) - i64::from(det.x0) + 1 + 2 * t).max(1),
            (i64::from(det.y1) - i64::from(det.y0) + 1 + 2 * t).max(1),
        ) else {
            break;
        };
        draw_hollow_rect_mut(canvas, rect, style.box_color);
    }
}

/// A rectangle whose every corner is addressable in `i32`, or `None`.
fn rect_from_i64(left: i64, top: i64, width: i64, height: i64) -> Option<Rect> {
    let width = u32::try_from(width).ok().filter(|w| *w > 0)?;
    let height = u32::try_from(height).ok().filter(|h| *h > 0)?;
    i32::try_from(left + i64::from(width)).ok()?;
    i32::try_from(top + i64::from(height)).ok()?;
    Some(Rect::at(i32::try_from(left).ok()?, i32::try_from(top).ok()?).of_size(width, height))
}

/// Label text size as (width, height): exact width when the font can
/// measure, otherwise 0.6em per character; one em per line.
fn label_extent(text: &str, font: &LabelFont) -> (u32, u32) {
    let px = font.px();
    let width = font
        .measure_width(text)
        .unwrap_or_else(|| (text.chars().count() as f32 * px as f32 * 0.6) as u32);
    let lines = text.matches('\n').count() as u32 + 1;
    (width, px.saturating_mul(lines))
}

fn draw_label(canvas: &mut RgbImage, det: &Detection, style: &DrawStyle, font: &LabelFont) {
    let text = det.label();
    let (text_w, text_h) = label_extent(&text, font);
    let (pad_x, pad_y) = (i64::from(style.label_padding.0), i64::from(style.label_padding.1));

    let box_top = i64::from(det.y0);
    let label_y0 = (box_top - i64::from(text_h) - 2 * pad_y).max(0);
    if box_top < label_y0 {
        // box top is above the image, there is no room for a label
        return;
    }
    // nothing past the canvas edge is visible, so the extent is clipped to it
    let label_w = (i64::from(text_w) + 2 * pad_x + 1).min(i64::from(canvas.width()));
    let label_h = (box_top - label_y0 + 1).min(i64::from(canvas.height()));

    let Some(rect) = rect_from_i64(i64::from(det.x0), label_y0, label_w, label_h) else {
        return;
    };
    draw_filled_rect_mut(canvas, rect, style.label_bg_color);

    let text_x = i32::try_from(i64::from(det.x0) + pad_x).unwrap_or(i32::MAX);
    let text_y = i32::try_from(label_y0 + pad_y).unwrap_or(i32::MAX);
    font.draw(canvas, text_x, text_y, &text, style.label_text_color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn detection(x0: i32, y0: i32, x1: i32, y1: i32) -> Detection {
        Detection {
            x0,
            y0,
            x1,
            y1,
            confidence: 0.9,
            class_id: 0,
        }
    }

    #[test]
    fn estimated_extent_without_measurement() {
        let font = LabelFont::Bitmap { px: 10 };
        assert_eq!(label_extent("person 0.90", &font), (66, 10));
        assert_eq!(label_extent("a\nb", &font), (18, 20));
    }

    #[test]
    fn thick_box_grows_outward() {
        let image = RgbImage::new(60, 60);
        let style = DrawStyle {
            box_color: Rgb([255, 0, 0]),
            box_thickness: 3,
            label_bg_color: Rgb([0, 0, 255]),
            label_text_color: Rgb([255, 255, 255]),
            font_px: 6,
            label_padding: (0, 0),
        };
        let mut canvas = image.clone();
        draw_box(&mut canvas, &detection(20, 20, 40, 40), &style);

        assert_eq!(*canvas.get_pixel(30, 40), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(30, 42), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(30, 43), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(30, 39), Rgb([0, 0, 0]));
    }

    #[test]
    fn label_never_rises_above_top() {
        let image = RgbImage::new(50, 50);
        let style = DrawStyle {
            box_color: Rgb([255, 0, 0]),
            box_thickness: 1,
            label_bg_color: Rgb([0, 0, 255]),
            label_text_color: Rgb([0, 0, 255]),
            font_px: 10,
            label_padding: (2, 2),
        };
        let font = LabelFont::Bitmap { px: 10 };
        let mut canvas = image.clone();
        draw_label(&mut canvas, &detection(5, 3, 30, 30), &style, &font);

        assert_eq!(*canvas.get_pixel(5, 0), Rgb([0, 0, 255]));
        assert_eq!(*canvas.get_pixel(5, 3), Rgb([0, 0, 255]));
        assert_eq!(*canvas.get_pixel(5, 4), Rgb([0, 0, 0]));
    }

    #[test]
    fn box_above_image_gets_no_label() {
        let image = RgbImage::new(20, 20);
        let style = resolve_style(&Config::default(), 20);
        let font = LabelFont::Bitmap { px: 6 };
        let mut canvas = image.clone();
        draw_label(&mut canvas, &detection(2, -30, 10, -5), &style, &font);
        assert_eq!(canvas, image);
    }

    fn plain_style(box_thickness: u32, font_px: u32, label_padding: (u32, u32)) -> DrawStyle {
        DrawStyle {
            box_color: Rgb([255, 0, 0]),
            box_thickness,
            label_bg_color: Rgb([0, 0, 255]),
            label_text_color: Rgb([255, 255, 255]),
            font_px,
            label_padding,
        }
    }

    #[test]
    fn huge_label_extent_does_not_overflow() {
        let image = RgbImage::new(100, 100);
        let det = detection(10, 40, 50, 90);

        let mut canvas = image.clone();
        let font = LabelFont::Bitmap { px: u32::MAX };
        draw_label(&mut canvas, &det, &plain_style(1, u32::MAX, (4, 2)), &font);
        assert_eq!(*canvas.get_pixel(10, 0), Rgb([0, 0, 255]));

        let mut canvas = image.clone();
        let font = LabelFont::Bitmap { px: 10 };
        draw_label(&mut canvas, &det, &plain_style(1, 10, (u32::MAX, u32::MAX)), &font);
        assert_eq!(*canvas.get_pixel(99, 40), Rgb([0, 0, 255]));
    }

    #[test]
    fn huge_thickness_still_draws_the_box() {
        let mut canvas = RgbImage::new(100, 100);
        draw_box(&mut canvas, &detection(20, 20, 40, 90), &plain_style(u32::MAX, 6, (0, 0)));
        assert_eq!(*canvas.get_pixel(30, 90), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn far_off_box_is_skipped_not_wrapped() {
        let image = RgbImage::new(20, 20);
        let mut canvas = image.clone();
        draw_box(&mut canvas, &detection(i32::MAX - 5, 0, i32::MAX, 10), &plain_style(3, 6, (0, 0)));
        assert_eq!(canvas, image);
        assert!(rect_from_i64(-5, -5, 10, 10).is_some());
        assert!(rect_from_i64(i64::from(i32::MAX), 0, 10, 10).is_none());
        assert!(rect_from_i64(0, 0, 0, 10).is_none());
    }
}

use image::Rgb;
use serde_yaml::Value;

use crate::config::{
    Config, DEFAULT_BOX_COLOR, DEFAULT_BOX_THICKNESS, DEFAULT_FONT_SIZE, DEFAULT_LABEL_BG_COLOR,
    DEFAULT_LABEL_PADDING, DEFAULT_LABEL_TEXT_COLOR, value_as_f64,
};

/// Smallest label font we ever render
pub const MIN_FONT_PX: u32 = 6;
/// Largest label font we ever render
pub const MAX_FONT_PX: u32 = 1024;
/// Upper bound for `box_thickness`
pub const MAX_BOX_THICKNESS: u32 = 1024;
/// Upper bound for each `label_padding` component
pub const MAX_LABEL_PADDING: u32 = 1024;

/// Concrete drawing parameters for one image
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStyle {
    pub box_color: Rgb<u8>,
    pub box_thickness: u32,
    pub label_bg_color: Rgb<u8>,
    pub label_text_color: Rgb<u8>,
    pub font_px: u32,
    pub label_padding: (u32, u32),
}

/// Derive the drawing style from the configuration and the image height.
pub fn resolve_style(config: &Config, image_height: u32) -> DrawStyle {
    let drawing = &config.drawing;

    DrawStyle {
        box_color: resolve_color(drawing.box_color.as_ref(), DEFAULT_BOX_COLOR),
        box_thickness: resolve_thickness(drawing.box_thickness.as_ref()),
        label_bg_color: resolve_color(drawing.label_bg_color.as_ref(), DEFAULT_LABEL_BG_COLOR),
        label_text_color: resolve_color(
            drawing.label_text_color.as_ref(),
            DEFAULT_LABEL_TEXT_COLOR,
        ),
        font_px: resolve_font_px(drawing.font_size.as_ref(), image_height),
        label_padding: resolve_padding(drawing.label_padding.as_ref()),
    }
}

/// Font size in pixels.
///
/// Ratio strings (`"1/50"`) and fractions in `(0, 1]` scale with the image
/// height; anything else numeric is an absolute size. The result always
/// lies in [`MIN_FONT_PX`]..=[`MAX_FONT_PX`], except that unusable input
/// yields [`DEFAULT_FONT_SIZE`] unmodified.
pub fn resolve_font_px(raw: Option<&Value>, image_height: u32) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_FONT_SIZE;
    };

    if let Value::String(s) = raw {
        if s.contains('/') {
            return parse_ratio(s)
                .and_then(|frac| scaled_px(image_height, frac))
                .unwrap_or(DEFAULT_FONT_SIZE);
        }
    }

    match value_as_f64(raw) {
        Some(v) if v > 0.0 && v <= 1.0 => {
            scaled_px(image_height, v).unwrap_or(DEFAULT_FONT_SIZE)
        }
        Some(v) => clamp_px(v.round()),
        None => DEFAULT_FONT_SIZE,
    }
}

fn parse_ratio(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    if den.contains('/') {
        return None;
    }
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    let frac = num / den;
    frac.is_finite().then_some(frac)
}

fn scaled_px(image_height: u32, frac: f64) -> Option<u32> {
    let px = (f64::from(image_height) * frac).round();
    px.is_finite().then(|| clamp_px(px))
}

fn clamp_px(px: f64) -> u32 {
    px.clamp(f64::from(MIN_FONT_PX), f64::from(MAX_FONT_PX)) as u32
}

/// A colour must be a sequence of at least three numbers; extra entries
/// are dropped.
fn resolve_color(raw: Option<&Value>, default: [u8; 3]) -> Rgb<u8> {
    let channels = match raw {
        Some(Value::Sequence(items)) if items.len() >= 3 => items[..3]
            .iter()
            .map(|v| value_as_f64(v).map(|c| c.clamp(0.0, 255.0) as u8))
            .collect::<Option<Vec<u8>>>(),
        _ => None,
    };

    match channels {
        Some(c) => Rgb([c[0], c[1], c[2]]),
        None => Rgb(default),
    }
}

fn resolve_thickness(raw: Option<&Value>) -> u32 {
    raw.and_then(value_as_f64)
        .map(|t| t.trunc().clamp(1.0, f64::from(MAX_BOX_THICKNESS)) as u32)
        .unwrap_or(DEFAULT_BOX_THICKNESS)
}

fn resolve_padding(raw: Option<&Value>) -> (u32, u32) {
    let (default_x, default_y) = DEFAULT_LABEL_PADDING;
    let Some(Value::Sequence(items)) = raw else {
        return DEFAULT_LABEL_PADDING;
    };

    let pad = |idx: usize, default: u32| {
        items
            .get(idx)
            .and_then(value_as_f64)
            .map(|p| p.trunc().clamp(0.0, f64::from(MAX_LABEL_PADDING)) as u32)
            .unwrap_or(default)
    };

    (pad(0, default_x), pad(1, default_y))
}

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Well-known DejaVu Sans locations, tried in order
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/local/share/fonts/DejaVuSans.ttf",
    "/Library/Fonts/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font used for confidence labels.
///
/// Both variants can report their pixel size and render text, so the
/// annotator never cares which one the lookup ended up with. Only the
/// vector font can measure text exactly.
pub enum LabelFont {
    Vector { font: Arc<FontVec>, px: u32 },
    Bitmap { px: u32 },
}

impl LabelFont {
    /// Look for a usable font at `px`: the preferred file first, then the
    /// system candidates, then the built-in bitmap font. Never fails.
    ///
    /// Each file is read at most once per process; later calls reuse the
    /// parsed font, or skip a file that already failed.
    pub fn acquire(px: u32, preferred: Option<&Path>) -> Self {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            if let Some(font) = cached_font(&path) {
                tracing::trace!("label font: {} at {}px", path.display(), px);
                return Self::Vector { font, px };
            }
        }

        tracing::debug!("no system font found, using built-in bitmap font at {}px", px);
        Self::Bitmap { px }
    }

    pub fn px(&self) -> u32 {
        match self {
            Self::Vector { px, .. } | Self::Bitmap { px } => *px,
        }
    }

    /// Exact rendered width, when the font can tell.
    pub fn measure_width(&self, text: &str) -> Option<u32> {
        match self {
            Self::Vector { font, px } => {
                Some(text_size(PxScale::from(*px as f32), &**font, text).0)
            }
            Self::Bitmap { .. } => None,
        }
    }

    pub fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        match self {
            Self::Vector { font, px } => {
                draw_text_mut(canvas, color, x, y, PxScale::from(*px as f32), &**font, text)
            }
            Self::Bitmap { px } => draw_bitmap_text(canvas, x, y, *px, text, color),
        }
    }
}

type FontCache = Mutex<HashMap<PathBuf, Option<Arc<FontVec>>>>;

fn font_cache() -> &'static FontCache {
    static FONTS: OnceLock<FontCache> = OnceLock::new();
    FONTS.get_or_init(Default::default)
}

/// Parsed font at `path`, loading it on first use.
fn cached_font(path: &Path) -> Option<Arc<FontVec>> {
    let mut fonts = font_cache().lock().unwrap_or_else(PoisonError::into_inner);
    fonts
        .entry(path.to_path_buf())
        .or_insert_with(|| match load_font_file(path) {
            Ok(font) => {
                tracing::debug!("loaded label font {}", path.display());
                Some(Arc::new(font))
            }
            Err(e) => {
                tracing::trace!("font {} unusable: {:#}", path.display(), e);
                None
            }
        })
        .clone()
}

fn load_font_file(path: &Path) -> anyhow::Result<FontVec> {
    let bytes = std::fs::read(path)?;
    Ok(FontVec::try_from_vec(bytes)?)
}

// Built-in 5x7 glyphs, one byte per row, bit 4 is the leftmost column.
// Each glyph sits in a 6x9 cell (one spacing column, one blank row above
// and below) which is stretched to the requested pixel size.
const CELL_COLS: u32 = 6;
const CELL_ROWS: u32 = 9;

fn glyph(c: char) -> [u8; 7] {
    match c {
        ' ' => [0x00; 7],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

/// Advance of one bitmap cell, matching the 0.6em width estimate.
pub(crate) fn bitmap_cell_width(px: u32) -> u32 {
    ((px as f32 * 0.6) as u32).max(1)
}

fn draw_bitmap_text(canvas: &mut RgbImage, x: i32, y: i32, px: u32, text: &str, color: Rgb<u8>) {
    if px == 0 {
        return;
    }
    let cell_w = i64::from(bitmap_cell_width(px));
    let px = i64::from(px);
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));

    for (line_idx, line) in text.split('\n').enumerate() {
        let top = i64::from(y) + line_idx as i64 * px;
        if top >= height {
            break;
        }
        // glyph rows that land on the canvas
        let rows = (-top).max(0)..(height - top).min(px);
        if rows.is_empty() {
            continue;
        }

        for (col, c) in line.chars().enumerate() {
            let left = i64::from(x) + col as i64 * cell_w;
            if left >= width {
                break;
            }
            let cols = (-left).max(0)..(width - left).min(cell_w);
            if cols.is_empty() {
                continue;
            }
            let bitmap = glyph(c);

            for dy in rows.clone() {
                let sy = dy * i64::from(CELL_ROWS) / px;
                if sy == 0 || sy > 7 {
                    continue;
                }
                let bits = bitmap[(sy - 1) as usize];
                for dx in cols.clone() {
                    let sx = dx * i64::from(CELL_COLS) / cell_w;
                    if sx >= 5 || bits & (0x10 >> sx) == 0 {
                        continue;
                    }
                    canvas.put_pixel((left + dx) as u32, (top + dy) as u32, color);
                }
            }
        }
    }
}

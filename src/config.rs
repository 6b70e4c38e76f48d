use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

pub const DEFAULT_INFERENCE_DEVICE: &str = "cpu";
pub const DEFAULT_INFERENCE_IMGSZ: u32 = 640;
pub const DEFAULT_INFERENCE_CONF: f32 = 0.25;

pub const DEFAULT_BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const DEFAULT_BOX_THICKNESS: u32 = 2;
pub const DEFAULT_LABEL_BG_COLOR: [u8; 3] = [0, 255, 0];
pub const DEFAULT_LABEL_TEXT_COLOR: [u8; 3] = [0, 0, 0];
pub const DEFAULT_FONT_SIZE: u32 = 16;
pub const DEFAULT_LABEL_PADDING: (u32, u32) = (4, 2);

/// Run configuration as read from `config.yaml`.
///
/// Every leaf is kept as a loose YAML value and only interpreted when it is
/// resolved, so a malformed field falls back to its own default without
/// affecting its neighbours.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceSection,
    pub drawing: DrawingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub device: Option<Value>,
    pub imgsz: Option<Value>,
    pub conf: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DrawingSection {
    pub box_color: Option<Value>,
    pub box_thickness: Option<Value>,
    pub label_bg_color: Option<Value>,
    pub label_text_color: Option<Value>,
    /// Absolute pixels, a fraction (<= 1) of image height, or a `"N/D"` ratio
    pub font_size: Option<Value>,
    pub label_padding: Option<Value>,
    /// Preferred font file, tried before the system candidates
    pub font_path: Option<Value>,
}

impl Config {
    /// The built-in configuration with every leaf populated.
    pub fn defaults() -> Self {
        Self {
            inference: InferenceSection {
                device: Some(Value::String(DEFAULT_INFERENCE_DEVICE.to_string())),
                imgsz: Some(Value::Number(u64::from(DEFAULT_INFERENCE_IMGSZ).into())),
                conf: Some(Value::Number(f64::from(DEFAULT_INFERENCE_CONF).into())),
            },
            drawing: DrawingSection {
                box_color: Some(color_value(DEFAULT_BOX_COLOR)),
                box_thickness: Some(Value::Number(u64::from(DEFAULT_BOX_THICKNESS).into())),
                label_bg_color: Some(color_value(DEFAULT_LABEL_BG_COLOR)),
                label_text_color: Some(color_value(DEFAULT_LABEL_TEXT_COLOR)),
                font_size: Some(Value::Number(u64::from(DEFAULT_FONT_SIZE).into())),
                label_padding: Some(Value::Sequence(vec![
                    Value::Number(u64::from(DEFAULT_LABEL_PADDING.0).into()),
                    Value::Number(u64::from(DEFAULT_LABEL_PADDING.1).into()),
                ])),
                font_path: None,
            },
        }
    }

    /// Parse a YAML document. An empty document yields an empty config.
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Fill every missing leaf with its built-in default.
    /// Leaves that are present are kept as-is, even when malformed.
    pub fn merged_with_defaults(self) -> Self {
        let defaults = Self::defaults();
        Self {
            inference: InferenceSection {
                device: self.inference.device.or(defaults.inference.device),
                imgsz: self.inference.imgsz.or(defaults.inference.imgsz),
                conf: self.inference.conf.or(defaults.inference.conf),
            },
            drawing: DrawingSection {
                box_color: self.drawing.box_color.or(defaults.drawing.box_color),
                box_thickness: self.drawing.box_thickness.or(defaults.drawing.box_thickness),
                label_bg_color: self.drawing.label_bg_color.or(defaults.drawing.label_bg_color),
                label_text_color: self
                    .drawing
                    .label_text_color
                    .or(defaults.drawing.label_text_color),
                font_size: self.drawing.font_size.or(defaults.drawing.font_size),
                label_padding: self.drawing.label_padding.or(defaults.drawing.label_padding),
                font_path: self.drawing.font_path,
            },
        }
    }
}

impl DrawingSection {
    pub fn font_path(&self) -> Option<PathBuf> {
        match &self.font_path {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(PathBuf::from(s.trim())),
            _ => None,
        }
    }
}

/// Load the run configuration.
///
/// A missing file yields the defaults. A file that cannot be read or parsed
/// also yields the defaults, with a warning. Otherwise the file is merged
/// over the defaults leaf by leaf.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Config::defaults();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|text| Config::from_yaml_str(&text));

    match parsed {
        Ok(cfg) => cfg.merged_with_defaults(),
        Err(e) => {
            tracing::warn!("ignoring unreadable config {}: {:#}", path.display(), e);
            Config::defaults()
        }
    }
}

/// Inference parameters handed to the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    pub device: String,
    pub image_size: u32,
    pub confidence: f32,
}

impl InferenceSettings {
    pub fn resolve(config: &Config) -> Self {
        let section = &config.inference;

        let device = match &section.device {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => DEFAULT_INFERENCE_DEVICE.to_string(),
        };

        let image_size = section
            .imgsz
            .as_ref()
            .and_then(value_as_f64)
            .filter(|v| *v >= 1.0)
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_INFERENCE_IMGSZ);

        let confidence = section
            .conf
            .as_ref()
            .and_then(value_as_f64)
            .map(|v| v as f32)
            .unwrap_or(DEFAULT_INFERENCE_CONF);

        Self {
            device,
            image_size,
            confidence,
        }
    }
}

fn color_value(rgb: [u8; 3]) -> Value {
    Value::Sequence(
        rgb.iter()
            .map(|c| Value::Number(u64::from(*c).into()))
            .collect(),
    )
}

/// Numeric coercion for loose config leaves. Numeric strings count.
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

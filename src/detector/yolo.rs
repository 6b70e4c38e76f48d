use anyhow::Context;
use image::RgbImage;
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;

use super::{BoxColumns, Detector, DetectorOutput};

const IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 300;

/// YOLOv8-style detector running on the rten CPU runtime.
///
/// Expects a single `[1, 3, S, S]` input and a `[1, 4 + classes, N]`
/// output with boxes as centre/size in model-input pixels.
pub struct YoloDetector {
    model: Model,
}

impl YoloDetector {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Detection model not found: {}\n\
                 Convert a YOLOv8 ONNX export with `rten-convert yolov8n.onnx` and place it there.",
                path.display()
            );
        }

        let model = Model::load_file(path)
            .with_context(|| format!("failed to load model {}", path.display()))?;
        tracing::info!("loaded detection model {}", path.display());

        Ok(Self { model })
    }
}

/// One candidate box in source image pixels
#[derive(Debug, Clone, Copy)]
struct Candidate {
    xyxy: [f32; 4],
    score: f32,
    class_id: usize,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.xyxy[2] - self.xyxy[0]).max(0.0) * (self.xyxy[3] - self.xyxy[1]).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let x0 = self.xyxy[0].max(other.xyxy[0]);
        let y0 = self.xyxy[1].max(other.xyxy[1]);
        let x1 = self.xyxy[2].min(other.xyxy[2]);
        let y1 = self.xyxy[3].min(other.xyxy[3]);
        let inter = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }
}

impl Detector for YoloDetector {
    fn predict(
        &self,
        image: &RgbImage,
        device: &str,
        image_size: u32,
        confidence: f32,
    ) -> anyhow::Result<Vec<DetectorOutput>> {
        if !device.eq_ignore_ascii_case("cpu") {
            tracing::warn!("device {device:?} is not available, running on cpu");
        }

        let input = to_input_tensor(image, image_size);
        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)
            .context("model inference failed")?
            .try_into()
            .context("unexpected model output")?;

        let sx = image.width() as f32 / image_size as f32;
        let sy = image.height() as f32 / image_size as f32;
        let candidates = decode_candidates(&output, confidence, sx, sy);
        let kept = non_max_suppression(candidates, IOU_THRESHOLD, MAX_DETECTIONS);

        Ok(vec![DetectorOutput {
            boxes: Some(to_columns(&kept)),
        }])
    }
}

/// Stretch to `size`x`size` and lay out as normalised NCHW.
fn to_input_tensor(image: &RgbImage, size: u32) -> NdTensor<f32, 4> {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }

    NdTensor::from_data([1, 3, size as usize, size as usize], data)
}

fn decode_candidates(output: &NdTensor<f32, 3>, confidence: f32, sx: f32, sy: f32) -> Vec<Candidate> {
    let channels = output.size(1);
    if channels <= 4 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for i in 0..output.size(2) {
        let mut class_id = 0;
        let mut score = f32::MIN;
        for c in 4..channels {
            let s = output[[0, c, i]];
            if s > score {
                score = s;
                class_id = c - 4;
            }
        }
        if score <= confidence {
            continue;
        }

        let (cx, cy) = (output[[0, 0, i]], output[[0, 1, i]]);
        let (w, h) = (output[[0, 2, i]], output[[0, 3, i]]);
        candidates.push(Candidate {
            xyxy: [
                (cx - w / 2.0) * sx,
                (cy - h / 2.0) * sy,
                (cx + w / 2.0) * sx,
                (cy + h / 2.0) * sy,
            ],
            score,
            class_id,
        });
    }
    candidates
}

/// Greedy per-class NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32, max_det: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.iou(&cand) > iou_threshold);
        if !overlaps {
            kept.push(cand);
            if kept.len() == max_det {
                break;
            }
        }
    }
    kept
}

fn to_columns(kept: &[Candidate]) -> BoxColumns {
    let n = kept.len();
    let xyxy: Vec<f32> = kept.iter().flat_map(|c| c.xyxy).collect();
    let conf: Vec<f32> = kept.iter().map(|c| c.score).collect();
    let cls: Vec<f32> = kept.iter().map(|c| c.class_id as f32).collect();

    BoxColumns::Tensors {
        xyxy: NdTensor::from_data([n, 4], xyxy),
        conf: NdTensor::from_data([n], conf),
        cls: NdTensor::from_data([n], cls),
    }
}

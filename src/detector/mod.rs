pub mod yolo;

use image::RgbImage;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use crate::models::Detection;

pub use yolo::YoloDetector;

/// An object detector the batch runner can drive.
pub trait Detector {
    /// Run inference on one image. Only the first output is consumed.
    fn predict(
        &self,
        image: &RgbImage,
        device: &str,
        image_size: u32,
        confidence: f32,
    ) -> anyhow::Result<Vec<DetectorOutput>>;
}

/// Raw per-image result of a detector
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    pub boxes: Option<BoxColumns>,
}

/// Detector box columns, either already materialised or still held in
/// tensors. Rows are matched by index across the three columns.
#[derive(Debug, Clone)]
pub enum BoxColumns {
    Lists {
        xyxy: Vec<[f32; 4]>,
        conf: Vec<f32>,
        cls: Vec<f32>,
    },
    Tensors {
        /// Shape `[n, 4]`
        xyxy: NdTensor<f32, 2>,
        /// Shape `[n]`
        conf: NdTensor<f32, 1>,
        /// Shape `[n]`
        cls: NdTensor<f32, 1>,
    },
}

impl BoxColumns {
    pub fn from_lists(xyxy: Vec<[f32; 4]>, conf: Vec<f32>, cls: Vec<f32>) -> Self {
        Self::Lists { xyxy, conf, cls }
    }

    /// Convert to plain detections. Columns of unequal length are cut to
    /// the shortest one.
    pub fn normalize(&self) -> Vec<Detection> {
        match self {
            Self::Lists { xyxy, conf, cls } => xyxy
                .iter()
                .zip(conf)
                .zip(cls)
                .map(|((b, c), k)| Detection::from_raw(*b, *c, *k))
                .collect(),
            Self::Tensors { xyxy, conf, cls } => {
                if xyxy.size(1) < 4 {
                    return Vec::new();
                }
                let rows = xyxy.size(0).min(conf.size(0)).min(cls.size(0));
                (0..rows)
                    .map(|i| {
                        let b = [xyxy[[i, 0]], xyxy[[i, 1]], xyxy[[i, 2]], xyxy[[i, 3]]];
                        Detection::from_raw(b, conf[[i]], cls[[i]])
                    })
                    .collect()
            }
        }
    }
}

impl DetectorOutput {
    pub fn detections(&self) -> Vec<Detection> {
        self.boxes
            .as_ref()
            .map(BoxColumns::normalize)
            .unwrap_or_default()
    }
}

/// Detections of the first output, or none if the detector returned nothing.
pub fn first_output_detections(outputs: &[DetectorOutput]) -> Vec<Detection> {
    outputs
        .first()
        .map(DetectorOutput::detections)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_and_tensors_normalize_alike() {
        let lists = BoxColumns::from_lists(
            vec![[1.5, 2.5, 30.9, 40.1], [5.0, 6.0, 7.0, 8.0]],
            vec![0.9, 0.4],
            vec![0.0, 2.0],
        );
        let tensors = BoxColumns::Tensors {
            xyxy: NdTensor::from_data([2, 4], vec![1.5, 2.5, 30.9, 40.1, 5.0, 6.0, 7.0, 8.0]),
            conf: NdTensor::from_data([2], vec![0.9, 0.4]),
            cls: NdTensor::from_data([2], vec![0.0, 2.0]),
        };

        let a = lists.normalize();
        let b = tensors.normalize();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!((a[0].x0, a[0].y0, a[0].x1, a[0].y1), (1, 2, 30, 40));
        assert_eq!(a[1].class_id, 2);
    }

    #[test]
    fn uneven_columns_use_shortest() {
        let lists = BoxColumns::from_lists(vec![[0.0, 0.0, 1.0, 1.0]; 3], vec![0.5; 2], vec![0.0; 3]);
        assert_eq!(lists.normalize().len(), 2);
    }

    #[test]
    fn empty_outputs_yield_no_detections() {
        assert!(first_output_detections(&[]).is_empty());
        assert!(first_output_detections(&[DetectorOutput::default()]).is_empty());
    }

    #[test]
    fn only_first_output_is_used() {
        let outputs = vec![
            DetectorOutput {
                boxes: Some(BoxColumns::from_lists(vec![[0.0, 0.0, 4.0, 4.0]], vec![0.7], vec![0.0])),
            },
            DetectorOutput {
                boxes: Some(BoxColumns::from_lists(vec![[1.0; 4]; 5], vec![0.7; 5], vec![0.0; 5])),
            },
        ];
        assert_eq!(first_output_detections(&outputs).len(), 1);
    }
}

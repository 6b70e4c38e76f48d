use image::{ImageBuffer, Rgb, RgbImage};
use personbox::batch::{BatchEvent, ProgressReporter};
use personbox::{BoxColumns, Detector, DetectorOutput};
use std::cell::RefCell;
use std::path::Path;

/// Solid-colour RGB image, dark by default so drawn boxes stand out.
pub fn make_test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |_, _| Rgb([10u8, 20u8, 30u8]))
}

/// Save a 200x120 test image at `path`; the format follows the extension.
pub fn write_test_image(path: &Path) -> anyhow::Result<()> {
    make_test_image(200, 120).save(path)?;
    Ok(())
}

/// Detector that returns the same canned output for every image and
/// remembers the `(device, image_size, confidence)` of each call.
pub struct FakeDetector {
    pub outputs: Vec<DetectorOutput>,
    pub calls: RefCell<usize>,
    pub settings_seen: RefCell<Vec<(String, u32, f32)>>,
}

impl FakeDetector {
    pub fn new(outputs: Vec<DetectorOutput>) -> Self {
        Self {
            outputs,
            calls: RefCell::new(0),
            settings_seen: RefCell::new(Vec::new()),
        }
    }

    /// One output holding the given boxes as plain lists.
    pub fn with_boxes(xyxy: Vec<[f32; 4]>, conf: Vec<f32>, cls: Vec<f32>) -> Self {
        Self::new(vec![DetectorOutput {
            boxes: Some(BoxColumns::from_lists(xyxy, conf, cls)),
        }])
    }
}

impl Detector for FakeDetector {
    fn predict(
        &self,
        _image: &RgbImage,
        device: &str,
        image_size: u32,
        confidence: f32,
    ) -> anyhow::Result<Vec<DetectorOutput>> {
        *self.calls.borrow_mut() += 1;
        self.settings_seen
            .borrow_mut()
            .push((device.to_string(), image_size, confidence));
        Ok(self.outputs.clone())
    }
}

/// Detector that always fails.
pub struct BrokenDetector;

impl Detector for BrokenDetector {
    fn predict(
        &self,
        _image: &RgbImage,
        _device: &str,
        _image_size: u32,
        _confidence: f32,
    ) -> anyhow::Result<Vec<DetectorOutput>> {
        anyhow::bail!("inference backend crashed")
    }
}

/// Collects progress lines instead of printing them.
#[derive(Default)]
pub struct RecordingReporter {
    pub lines: RefCell<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &BatchEvent) {
        self.lines.borrow_mut().push(event.to_string());
    }
}

impl RecordingReporter {
    pub fn lines_starting_with(&self, prefix: &str) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .cloned()
            .collect()
    }
}

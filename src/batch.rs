use anyhow::Context;
use image::{ImageFormat, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{Config, InferenceSettings};
use crate::detector::{Detector, first_output_detections};
use crate::drawing::annotate;
use crate::error::{BatchError, BatchResult};
use crate::models::Detection;

/// File extensions picked up from the input directory (compared lowercase)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

/// A regular file with a supported image extension
pub fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Images directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_image(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// What to do when a single file fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report the file and move on
    #[default]
    SkipAndContinue,
    /// Stop the batch at the first failing file
    Abort,
}

/// Progress of a batch, one event per user-visible line
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    NoImages { dir: PathBuf },
    Processing { name: String },
    Saved { path: PathBuf, persons: usize },
    Skipped { name: String, reason: String },
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImages { dir } => write!(f, "No images in {}", dir.display()),
            Self::Processing { name } => write!(f, "Processing {name}"),
            Self::Saved { path, persons } => {
                write!(f, "Saved {} ({persons} persons)", path.display())
            }
            Self::Skipped { name, reason } => write!(f, "Skipped {name}: {reason}"),
        }
    }
}

pub trait ProgressReporter {
    fn report(&self, event: &BatchEvent);
}

/// Prints every event on its own stdout line
pub struct StdoutReporter;

impl ProgressReporter for StdoutReporter {
    fn report(&self, event: &BatchEvent) {
        println!("{event}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub persons: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub saved: Vec<SavedImage>,
    pub skipped: Vec<SkippedImage>,
}

impl BatchSummary {
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.skipped.is_empty()
    }
}

/// Drives a folder of images through detection and annotation, one file
/// at a time. The detector and configuration are shared by every file.
pub struct BatchRunner<'a> {
    detector: &'a dyn Detector,
    config: &'a Config,
    settings: InferenceSettings,
    policy: FailurePolicy,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> BatchRunner<'a> {
    /// Runner with inference settings taken from `config`
    pub fn new(detector: &'a dyn Detector, config: &'a Config) -> Self {
        Self {
            detector,
            config,
            settings: InferenceSettings::resolve(config),
            policy: FailurePolicy::default(),
            reporter: &StdoutReporter,
        }
    }

    pub fn with_settings(mut self, settings: InferenceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Annotate every image in `input_dir` into `output_dir` under the same
    /// file name. Missing directories are fatal; per-file failures follow
    /// the failure policy.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> BatchResult<BatchSummary> {
        if !input_dir.is_dir() {
            return Err(BatchError::InputDirMissing(input_dir.to_path_buf()));
        }
        std::fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let images = list_images(input_dir).map_err(|source| BatchError::ListInput {
            path: input_dir.to_path_buf(),
            source,
        })?;

        let mut summary = BatchSummary::default();
        if images.is_empty() {
            self.reporter.report(&BatchEvent::NoImages {
                dir: input_dir.to_path_buf(),
            });
            return Ok(summary);
        }

        tracing::debug!(
            "processing {} images on {} (imgsz {}, conf {})",
            images.len(),
            self.settings.device,
            self.settings.image_size,
            self.settings.confidence
        );

        for path in images {
            let name = display_name(&path);
            self.reporter.report(&BatchEvent::Processing { name: name.clone() });

            match self.process_file(&path, output_dir) {
                Ok(saved) => {
                    self.reporter.report(&BatchEvent::Saved {
                        path: saved.path.clone(),
                        persons: saved.persons,
                    });
                    summary.saved.push(saved);
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    tracing::error!("{}: {}", path.display(), reason);

                    if self.policy == FailurePolicy::Abort {
                        return Err(BatchError::Aborted { file: path, reason });
                    }
                    self.reporter.report(&BatchEvent::Skipped {
                        name,
                        reason: reason.clone(),
                    });
                    summary.skipped.push(SkippedImage { path, reason });
                }
            }
        }

        Ok(summary)
    }

    fn process_file(&self, path: &Path, output_dir: &Path) -> anyhow::Result<SavedImage> {
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();

        let outputs = self
            .detector
            .predict(
                &image,
                &self.settings.device,
                self.settings.image_size,
                self.settings.confidence,
            )
            .context("detector failed")?;

        let persons: Vec<Detection> = first_output_detections(&outputs)
            .into_iter()
            .filter(Detection::is_person)
            .collect();

        let annotated = annotate(&image, &persons, self.config);

        let file_name = path
            .file_name()
            .with_context(|| format!("no file name in {}", path.display()))?;
        let out_path = output_dir.join(file_name);
        save_atomically(&annotated, &out_path)?;

        Ok(SavedImage {
            path: out_path,
            persons: persons.len(),
        })
    }
}

/// Run a batch with the default skip-and-continue policy, reporting to stdout.
pub fn run_batch(
    detector: &dyn Detector,
    input_dir: &Path,
    output_dir: &Path,
    confidence: f32,
    device: &str,
    image_size: u32,
    config: &Config,
) -> BatchResult<BatchSummary> {
    BatchRunner::new(detector, config)
        .with_settings(InferenceSettings {
            device: device.to_string(),
            image_size,
            confidence,
        })
        .run(input_dir, output_dir)
}

/// Encode next to `dest` under a hidden name, then rename into place, so a
/// failed write never leaves a partial file under the final name.
pub fn save_atomically(image: &RgbImage, dest: &Path) -> anyhow::Result<()> {
    let format = ImageFormat::from_path(dest)
        .with_context(|| format!("unsupported output format for {}", dest.display()))?;
    let file_name = dest
        .file_name()
        .with_context(|| format!("no file name in {}", dest.display()))?;
    let tmp = dest.with_file_name(format!(".{}.partial", file_name.to_string_lossy()));

    let written = image
        .save_with_format(&tmp, format)
        .map_err(anyhow::Error::from)
        .and_then(|()| std::fs::rename(&tmp, dest).map_err(anyhow::Error::from));

    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.context(format!("failed to write {}", dest.display())));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use image::GrayImage;
use thiserror::Error;
use tracing::debug;

use super::setup::{locate_tessdata, locate_tesseract};
use crate::config::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tesseract page segmentation mode (`--psm`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageSegMode(pub u8);

impl PageSegMode {
    /// Fully automatic page segmentation
    pub const AUTO: PageSegMode = PageSegMode(3);
    /// Assume a single uniform block of text
    pub const SINGLE_BLOCK: PageSegMode = PageSegMode(6);
    /// Find as much text as possible in no particular order
    pub const SPARSE_TEXT: PageSegMode = PageSegMode(11);
}

impl fmt::Display for PageSegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("tesseract not found: {0}")]
    NotFound(String),
    #[error("cannot run OCR on an empty image")]
    EmptyImage,
    #[error("failed to encode OCR input: {0}")]
    Encode(#[from] image::ImageError),
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tesseract exited with {status}: {stderr}")]
    Engine { status: ExitStatus, stderr: String },
    #[error("tesseract timed out after {0:?}")]
    Timeout(Duration),
}

/// A text recogniser: pixels in, best-guess text out.
///
/// Implementations must be usable from several threads at once; the body-number
/// sweep issues independent calls in parallel.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, lang: &str, psm: PageSegMode) -> Result<String, OcrError>;
}

/// Runs the `tesseract` command-line tool once per call.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            executable,
            tessdata,
            timeout,
        }
    }

    /// Locates tesseract and its language data according to `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, OcrError> {
        let executable = locate_tesseract(settings.tesseract_path.as_deref())?;
        let tessdata = locate_tessdata(settings.tessdata_dir.as_deref(), &settings.ocr_lang);
        let timeout = (settings.ocr_timeout_secs > 0)
            .then(|| Duration::from_secs(settings.ocr_timeout_secs));

        debug!(
            "Using tesseract at {} (tessdata: {:?}, timeout: {:?})",
            executable.display(),
            tessdata,
            timeout
        );
        Ok(Self::new(executable, tessdata, timeout))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage, lang: &str, psm: PageSegMode) -> Result<String, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::EmptyImage);
        }

        // Tesseract appends ".txt" to the output base
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.png");
        let output_base = workdir.path().join("output");
        // stderr goes to a file so a chatty run can never fill a pipe and stall
        let stderr_path = workdir.path().join("stderr.log");
        let stderr_file = std::fs::File::create(&stderr_path)?;
        image.save(&input)?;

        let mut command = Command::new(&self.executable);
        command
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(lang)
            .arg("--psm")
            .arg(psm.to_string());
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()?;

        let status = wait_with_deadline(&mut child, self.timeout)?;
        if !status.success() {
            let stderr = std::fs::read(&stderr_path).unwrap_or_default();
            return Err(OcrError::Engine {
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let bytes = std::fs::read(output_base.with_extension("txt"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Waits for `child`, killing it once `timeout` has elapsed.
fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, OcrError> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(OcrError::Timeout(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psm_display() {
        assert_eq!(PageSegMode::AUTO.to_string(), "3");
        assert_eq!(PageSegMode::SINGLE_BLOCK.to_string(), "6");
        assert_eq!(PageSegMode(11), PageSegMode::SPARSE_TEXT);
    }

    #[test]
    fn test_empty_image_rejected_before_spawn() {
        let engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract"), None, None);
        let err = engine
            .recognize(&GrayImage::new(0, 10), "eng", PageSegMode::SINGLE_BLOCK)
            .unwrap_err();
        assert!(matches!(err, OcrError::EmptyImage));
    }

    #[test]
    fn test_missing_executable_is_io_error() {
        let engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract"), None, None);
        let err = engine
            .recognize(&GrayImage::new(4, 4), "eng", PageSegMode::SINGLE_BLOCK)
            .unwrap_err();
        assert!(matches!(err, OcrError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let err = wait_with_deadline(&mut child, Some(Duration::from_millis(50))).unwrap_err();
        assert!(matches!(err, OcrError::Timeout(_)));
    }

    /// Writes an executable shell script standing in for tesseract.
    #[cfg(unix)]
    fn fake_tesseract(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // 200 KB of diagnostics, far beyond a pipe buffer, before the text is written
    #[cfg(unix)]
    const NOISY_SCRIPT: &str = "head -c 200000 /dev/zero | tr '\\0' 'x' >&2\n\
                                printf 'WP1ZZZ9PZ9LA42290\\n' > \"$2.txt\"";

    #[cfg(unix)]
    #[test]
    fn test_noisy_stderr_does_not_stall_with_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), NOISY_SCRIPT);
        let engine = TesseractEngine::new(exe, None, Some(Duration::from_secs(20)));

        let text = engine
            .recognize(&GrayImage::new(4, 4), "eng", PageSegMode::SINGLE_BLOCK)
            .unwrap();
        assert_eq!(text.trim(), "WP1ZZZ9PZ9LA42290");
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_stderr_does_not_stall_without_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), NOISY_SCRIPT);
        let engine = TesseractEngine::new(exe, None, None);

        let text = engine
            .recognize(&GrayImage::new(4, 4), "eng", PageSegMode::SINGLE_BLOCK)
            .unwrap();
        assert_eq!(text.trim(), "WP1ZZZ9PZ9LA42290");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_run_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), "echo 'Failed loading language' >&2\nexit 1");
        let engine = TesseractEngine::new(exe, None, Some(Duration::from_secs(20)));

        let err = engine
            .recognize(&GrayImage::new(4, 4), "xyz", PageSegMode::AUTO)
            .unwrap_err();
        match err {
            OcrError::Engine { status, stderr } => {
                assert!(!status.success());
                assert_eq!(stderr, "Failed loading language");
            }
            other => panic!("unexpected error {}", other),
        }
    }
}

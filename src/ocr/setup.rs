use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::engine::OcrError;
use crate::paths::tessdata_cache_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const COMMON_EXECUTABLES: [&str; 5] = [
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA: [&str; 4] = [
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Splits a `+`-joined language hint ("rus+eng") into its parts.
pub fn languages(lang: &str) -> Vec<&str> {
    lang.split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// True when `dir` holds a `.traineddata` file for every language in `lang`.
pub fn has_traineddata(dir: &Path, lang: &str) -> bool {
    let langs = languages(lang);
    !langs.is_empty()
        && langs
            .iter()
            .all(|l| dir.join(format!("{}.traineddata", l)).exists())
}

/// Finds the tesseract executable: explicit setting first, then PATH, then
/// common install locations.
pub fn locate_tesseract(explicit: Option<&Path>) -> Result<PathBuf, OcrError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(OcrError::NotFound(format!(
            "configured path {} does not exist",
            path.display()
        )));
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            OcrError::NotFound("install tesseract-ocr or set `tesseract_path`".to_string())
        })
}

/// Finds a tessdata directory holding every requested language.
///
/// Returns `None` when nothing suitable is found, leaving tesseract to use its
/// compiled-in default.
pub fn locate_tessdata(explicit: Option<&Path>, lang: &str) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }

    let mut candidates = vec![tessdata_cache_dir()];
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }
    candidates.extend(COMMON_TESSDATA.iter().map(PathBuf::from));

    let found = candidates.into_iter().find(|dir| has_traineddata(dir, lang));
    debug!("tessdata for {}: {:?}", lang, found);
    found
}

/// Downloads every missing `<lang>.traineddata` into `dir`.
/// Returns the paths that were fetched.
pub fn ensure_traineddata(dir: &Path, lang: &str) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let mut fetched = Vec::new();
    for l in languages(lang) {
        let target = dir.join(format!("{}.traineddata", l));
        if target.exists() {
            continue;
        }

        let url = format!("{}/{}.traineddata", TESSDATA_REPO, l);
        info!("Downloading {}", url);

        let response = client
            .get(&url)
            .header("User-Agent", "sts-ocr")
            .send()?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to download {}.traineddata: HTTP {}",
                l,
                response.status()
            ));
        }

        let bytes = response.bytes()?;
        write_atomically(&target, &bytes)?;

        info!("Downloaded {}.traineddata ({} bytes)", l, bytes.len());
        fetched.push(target);
    }

    Ok(fetched)
}

/// Writes `bytes` to a temporary file next to `target`, then renames it into
/// place. A failed write never leaves a truncated `target` behind.
fn write_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    file.persist(target)
        .with_context(|| format!("Failed to move download into {}", target.display()))?;
    Ok(())
}

//! STS OCR
//!
//! Reads the registration plate, VIN and body number from a directory of
//! photographed vehicle registration certificates and writes them as JSON.

use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sts_ocr::batch::{process_directory, save_results};
use sts_ocr::config::UpscaleMethod;
use sts_ocr::ocr::ensure_traineddata;
use sts_ocr::paths::{default_config_path, tessdata_cache_dir};
use sts_ocr::{BatchResult, Settings, TesseractEngine, VehicleParser};

/// Prefix of environment variables that override settings.
const ENV_PREFIX: &str = "VOCR_";

#[derive(Parser)]
#[command(name = "sts-ocr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract plate, VIN and body number from registration certificate scans", long_about = None)]
struct Cli {
    /// Directory containing certificate images
    #[arg(long, short, default_value = "data/input", env = "VOCR_INPUT_DIR")]
    input: PathBuf,

    /// Results file
    #[arg(long, short, default_value = "data/output/results.json", env = "VOCR_OUTPUT_FILE")]
    output: PathBuf,

    /// Settings file (defaults to config.json next to the executable)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Tesseract language hint, e.g. "eng" or "rus+eng"
    #[arg(long)]
    lang: Option<String>,

    /// Page segmentation mode for the single-pass fields
    #[arg(long)]
    psm: Option<u8>,

    /// Worker threads (defaults to number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Download missing .traineddata files before processing
    #[arg(long)]
    download_traineddata: bool,

    /// Print nothing but warnings and errors
    #[arg(long, short)]
    quiet: bool,
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default(&default_config_path()),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;

    if let Some(lang) = &cli.lang {
        settings.ocr_lang = lang.clone();
    }
    if let Some(psm) = cli.psm {
        settings.ocr_psm = psm;
    }
    if let Some(threads) = cli.threads {
        settings.max_threads = Some(threads);
    }

    settings.validate()?;
    Ok(settings)
}

fn env_value<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    match lookup(&key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value {:?} for {}: {}", raw, key, e)),
        None => Ok(None),
    }
}

/// Applies `VOCR_*` overrides on top of file settings; CLI flags still win.
fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    macro_rules! override_field {
        ($name:literal => $($field:ident).+) => {
            if let Some(value) = env_value(&lookup, $name)? {
                settings.$($field).+ = value;
            }
        };
    }

    override_field!("TESSERACT_LANG" => ocr_lang);
    override_field!("TESSERACT_PSM" => ocr_psm);
    override_field!("OCR_TIMEOUT_SECS" => ocr_timeout_secs);
    override_field!("CLAHE_CLIP_LIMIT" => clahe_clip_limit);
    override_field!("CLAHE_TILE_SIZE" => clahe_tile_size);
    override_field!("MIN_IMAGE_HEIGHT" => min_image_height);
    override_field!("REG_NUMBER_REGION_START" => reg_number_region.start);
    override_field!("REG_NUMBER_REGION_END" => reg_number_region.end);
    override_field!("VIN_REGION_START" => vin_region.start);
    override_field!("VIN_REGION_END" => vin_region.end);
    override_field!("BODY_NUMBER_REGION_START" => body_number_region.start);
    override_field!("BODY_NUMBER_REGION_END" => body_number_region.end);
    override_field!("VIN_LENGTH" => vin_length);
    override_field!("MIN_REG_NUMBER_LENGTH" => min_reg_number_length);
    override_field!("MAX_REG_NUMBER_LENGTH" => max_reg_number_length);

    if let Some(method) = env_value::<String>(&lookup, "UPSCALE_METHOD")? {
        settings.upscale_method = match method.to_lowercase().as_str() {
            "linear" => UpscaleMethod::Linear,
            "cubic" => UpscaleMethod::Cubic,
            "lanczos" => UpscaleMethod::Lanczos,
            other => bail!("Invalid value {:?} for {}UPSCALE_METHOD", other, ENV_PREFIX),
        };
    }
    if let Some(path) = env_value::<PathBuf>(&lookup, "TESSERACT_PATH")? {
        settings.tesseract_path = Some(path);
    }
    if let Some(dir) = env_value::<PathBuf>(&lookup, "TESSDATA_DIR")? {
        settings.tessdata_dir = Some(dir);
    }

    Ok(())
}

/// Per-document blocks and a summary. Writes nothing in quiet mode.
fn write_report(out: &mut impl Write, batch: &BatchResult, output: &Path, quiet: bool) -> io::Result<()> {
    if quiet {
        return Ok(());
    }

    let show = |field: &Option<String>| field.as_deref().unwrap_or("-").to_string();
    for doc in &batch.documents {
        writeln!(out, "{}", doc.file)?;
        writeln!(out, "  Reg. number: {}", show(&doc.reg_number))?;
        writeln!(out, "  VIN:         {}", show(&doc.vin))?;
        writeln!(out, "  Body number: {}", show(&doc.body_number))?;
    }

    let stats = &batch.statistics;
    let total = batch.total_processed;
    writeln!(out)?;
    writeln!(out, "Processed:    {}", total)?;
    writeln!(out, "Reg. numbers: {}/{}", stats.reg_numbers_found, total)?;
    writeln!(out, "VINs:         {}/{}", stats.vins_found, total)?;
    writeln!(out, "Body numbers: {}/{}", stats.body_numbers_found, total)?;
    writeln!(out, "\nResults saved to {}", output.display())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let mut settings = load_settings(&cli)?;

    if let Some(threads) = settings.max_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure thread pool")?;
        info!("Using {} worker threads", threads);
    }

    if !cli.input.is_dir() {
        bail!("Input directory {} does not exist", cli.input.display());
    }

    if cli.download_traineddata {
        let dir = settings.tessdata_dir.clone().unwrap_or_else(tessdata_cache_dir);
        let fetched = ensure_traineddata(&dir, &settings.ocr_lang)?;
        if !fetched.is_empty() {
            info!("Downloaded {} language file(s) to {}", fetched.len(), dir.display());
        }
        settings.tessdata_dir.get_or_insert(dir);
    }

    let engine = TesseractEngine::from_settings(&settings).context("Tesseract is not available")?;
    let parser = VehicleParser::new(settings, engine).context("Failed to compile field patterns")?;

    let batch = process_directory(&parser, &cli.input)?;
    if batch.total_processed == 0 {
        warn!("No images found in {}", cli.input.display());
    }

    save_results(&cli.output, &batch)?;
    write_report(&mut io::stdout().lock(), &batch, &cli.output, cli.quiet)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut settings = Settings::default();
        let vars = lookup(&[
            ("VOCR_TESSERACT_LANG", "rus+eng"),
            ("VOCR_TESSERACT_PSM", "11"),
            ("VOCR_CLAHE_CLIP_LIMIT", "3.5"),
            ("VOCR_VIN_REGION_START", "0.3"),
            ("VOCR_UPSCALE_METHOD", "Lanczos"),
            ("VOCR_TESSDATA_DIR", "/opt/tessdata"),
        ]);
        apply_env_overrides(&mut settings, vars).unwrap();

        assert_eq!(settings.ocr_lang, "rus+eng");
        assert_eq!(settings.ocr_psm, 11);
        assert_eq!(settings.clahe_clip_limit, 3.5);
        assert_eq!(settings.vin_region.start, 0.3);
        assert_eq!(settings.vin_region.end, 0.60);
        assert_eq!(settings.upscale_method, UpscaleMethod::Lanczos);
        assert_eq!(settings.tessdata_dir, Some(PathBuf::from("/opt/tessdata")));
        assert_eq!(settings.min_image_height, 800);
    }

    #[test]
    fn test_no_env_leaves_settings_unchanged() {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |_| None).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_bad_env_value_is_error() {
        let mut settings = Settings::default();
        assert!(apply_env_overrides(&mut settings, lookup(&[("VOCR_VIN_LENGTH", "long")])).is_err());
        assert!(apply_env_overrides(&mut settings, lookup(&[("VOCR_UPSCALE_METHOD", "nearest")])).is_err());
    }

    fn sample_batch() -> BatchResult {
        let mut doc = sts_ocr::ExtractionResult::empty("scan.jpg");
        doc.vin = Some("WP1ZZZ9PZ9LA42290".to_string());
        BatchResult::from_results(vec![doc])
    }

    #[test]
    fn test_report_lists_documents() {
        let mut out = Vec::new();
        write_report(&mut out, &sample_batch(), Path::new("out.json"), false).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("scan.jpg"));
        assert!(text.contains("VIN:         WP1ZZZ9PZ9LA42290"));
        assert!(text.contains("VINs:         1/1"));
        assert!(text.contains("Results saved to out.json"));
    }

    #[test]
    fn test_quiet_report_is_silent() {
        let mut out = Vec::new();
        write_report(&mut out, &sample_batch(), Path::new("out.json"), true).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_quiet_flag_parses() {
        let cli = Cli::try_parse_from(["sts-ocr", "--quiet", "--input", "scans"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.input, PathBuf::from("scans"));
    }
}

use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the default settings file: `<exe_dir>/config.json`
pub fn default_config_path() -> PathBuf {
    exe_dir().join("config.json")
}

/// Returns the local traineddata cache: `<data_local_dir>/sts-ocr/tessdata/`
pub fn tessdata_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| exe_dir().clone())
        .join("sts-ocr")
        .join("tessdata")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_next_to_exe() {
        let path = default_config_path();
        assert_eq!(path.file_name().unwrap(), "config.json");
        assert_eq!(path.parent().unwrap(), exe_dir().as_path());
    }

    #[test]
    fn test_tessdata_cache_dir_suffix() {
        let dir = tessdata_cache_dir();
        assert!(dir.ends_with("sts-ocr/tessdata"));
    }
}

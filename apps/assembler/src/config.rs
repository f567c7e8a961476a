use std::{collections::HashMap, fs, path::PathBuf};

use shared::domain::DEFAULT_OUTPUT_NAME;

pub const CONFIG_FILE: &str = "assembler.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub output_name: String,
    pub overwrite: bool,
    pub preview_width: u32,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_name: DEFAULT_OUTPUT_NAME.into(),
            overwrite: false,
            preview_width: 200,
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(CONFIG_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings.output_name = normalize_output_name(&settings.output_name);
    settings
}

/// Overlays keys from a flat `key = "value"` table. Unparsable files and
/// unknown keys are ignored.
pub fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("output_dir") {
        settings.output_dir = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("output_name") {
        settings.output_name = v.clone();
    }
    if let Some(v) = file_cfg.get("overwrite").and_then(|v| parse_bool(v)) {
        settings.overwrite = v;
    }
    if let Some(v) = file_cfg.get("preview_width").and_then(|v| v.parse().ok()) {
        settings.preview_width = v;
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

pub fn apply_env<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("APP__OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__OUTPUT_NAME") {
        settings.output_name = v;
    }
    if let Some(v) = lookup("APP__OVERWRITE").and_then(|v| parse_bool(&v)) {
        settings.overwrite = v;
    }
    if let Some(v) = lookup("APP__PREVIEW_WIDTH").and_then(|v| v.parse::<u32>().ok()) {
        settings.preview_width = v;
    }

    if let Some(v) = lookup("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

/// Keeps only the final path component and makes sure it ends in `.pdf`.
pub fn normalize_output_name(raw: &str) -> String {
    let name = raw
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return DEFAULT_OUTPUT_NAME.to_string();
    }
    if name.to_ascii_lowercase().ends_with(".pdf") {
        return name.to_string();
    }
    format!("{name}.pdf")
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

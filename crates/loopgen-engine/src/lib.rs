pub mod credentials;
pub mod normalize;
pub mod providers;
pub mod submit;

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Response as HttpResponse;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use credentials::{CredentialPool, Rotation};
pub use normalize::{
    find_start_frame, flatten_to_jpeg, normalize_image, parse_background, plan_crop,
    AspectConstraints, Background, Backup, CropBox, CropPlan, FlattenOutcome, NormalizeError,
    NormalizeOptions, NormalizeOutcome, StartFrameSource,
};
pub use providers::{
    DryrunProvider, GeneratedVideo, Operation, VeoProvider, VideoProvider, VideoRequest,
};
pub use submit::{
    ActionOutcome, ActionStatus, BatchReport, StartFrame, SubmitSettings, Submitter,
};

pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-generate-preview";

/// Environment fallbacks for `--api-key`, most specific first.
pub fn api_keys_from_env() -> Vec<String> {
    ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .into_iter()
        .filter_map(non_empty_env)
        .take(1)
        .flat_map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>()
        })
        .collect()
}

/// Hex SHA-256 of a file's bytes, used to fingerprint the start frame in run events.
pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    if !status.is_success() {
        bail!("{label} request failed ({code}): {}", truncate_text(&body, 512));
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{label} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub(crate) fn output_extension_from_mime(mime: Option<&str>) -> &'static str {
    let Some(mime) = mime else {
        return "mp4";
    };
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("webm") {
        return "webm";
    }
    if lowered.contains("quicktime") {
        return "mov";
    }
    if lowered.contains("png") {
        return "png";
    }
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    "mp4"
}

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::{non_empty_env, response_json_or_error, truncate_text};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const SUBMIT_TIMEOUT_S: u64 = 120;
const POLL_TIMEOUT_S: u64 = 60;
const DOWNLOAD_TIMEOUT_S: u64 = 300;

/// One image-to-video generation request.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub image_bytes: Vec<u8>,
    pub image_mime_type: String,
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    pub number_of_videos: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub uri: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub mime_type: Option<String>,
}

/// Snapshot of a long-running generation operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub error: Option<String>,
    pub videos: Vec<GeneratedVideo>,
    pub raw: Value,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            error: None,
            videos: Vec::new(),
            raw: Value::Null,
        }
    }
}

pub trait VideoProvider: Send + Sync {
    fn name(&self) -> &str;
    fn submit(&self, api_key: &str, request: &VideoRequest) -> Result<Operation>;
    fn refresh(&self, api_key: &str, operation: &Operation) -> Result<Operation>;
    fn download(&self, api_key: &str, video: &GeneratedVideo, dest: &Path) -> Result<()>;
}

pub struct VeoProvider {
    api_base: String,
    http: HttpClient,
}

impl Default for VeoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VeoProvider {
    pub fn new() -> Self {
        Self::with_api_base(
            non_empty_env("VEO_API_BASE")
                .or_else(|| non_empty_env("GEMINI_API_BASE"))
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        )
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:predictLongRunning", self.api_base, model_path)
    }

    fn operation_url(&self, name: &str) -> String {
        format!("{}/{}", self.api_base, name.trim_start_matches('/'))
    }

    fn build_payload(request: &VideoRequest) -> Value {
        json!({
            "instances": [{
                "prompt": request.prompt,
                "image": {
                    "bytesBase64Encoded": BASE64.encode(&request.image_bytes),
                    "mimeType": request.image_mime_type,
                },
            }],
            "parameters": {
                "aspectRatio": request.aspect_ratio,
                "durationSeconds": request.duration_seconds,
                "sampleCount": request.number_of_videos,
            },
        })
    }

    fn parse_operation(payload: Value) -> Result<Operation> {
        let Some(name) = payload
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            bail!(
                "Veo response missing operation name: {}",
                truncate_text(&payload.to_string(), 512)
            );
        };
        let done = payload.get("done").and_then(Value::as_bool).unwrap_or(false);
        let error = payload.get("error").map(|error| {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            match error.get("code").and_then(Value::as_i64) {
                Some(code) => format!("({code}) {message}"),
                None => message.to_string(),
            }
        });
        let videos = Self::extract_videos(&payload)?;
        Ok(Operation {
            name,
            done,
            error,
            videos,
            raw: payload,
        })
    }

    fn extract_videos(payload: &Value) -> Result<Vec<GeneratedVideo>> {
        let Some(response) = payload.get("response") else {
            return Ok(Vec::new());
        };
        let samples = response
            .get("generateVideoResponse")
            .and_then(|value| value.get("generatedSamples"))
            .or_else(|| response.get("generatedVideos"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::new();
        for sample in samples {
            let Some(video) = sample.get("video").and_then(Value::as_object) else {
                continue;
            };
            let uri = video
                .get("uri")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            let bytes = match video
                .get("bytesBase64Encoded")
                .or_else(|| video.get("videoBytes"))
                .and_then(Value::as_str)
            {
                Some(encoded) => Some(
                    BASE64
                        .decode(encoded.as_bytes())
                        .context("Veo video base64 decode failed")?,
                ),
                None => None,
            };
            if uri.is_none() && bytes.is_none() {
                continue;
            }
            out.push(GeneratedVideo {
                uri,
                bytes,
                mime_type: video
                    .get("mimeType")
                    .or_else(|| video.get("encoding"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        Ok(out)
    }
}

impl VideoProvider for VeoProvider {
    fn name(&self) -> &str {
        "veo"
    }

    fn submit(&self, api_key: &str, request: &VideoRequest) -> Result<Operation> {
        let endpoint = self.endpoint_for_model(&request.model);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .timeout(Duration::from_secs(SUBMIT_TIMEOUT_S))
            .json(&Self::build_payload(request))
            .send()
            .with_context(|| format!("Veo request failed ({endpoint})"))?;
        let payload = response_json_or_error("Veo submit", response)?;
        Self::parse_operation(payload)
    }

    fn refresh(&self, api_key: &str, operation: &Operation) -> Result<Operation> {
        let url = self.operation_url(&operation.name);
        let response = self
            .http
            .get(&url)
            .query(&[("key", api_key)])
            .timeout(Duration::from_secs(POLL_TIMEOUT_S))
            .send()
            .with_context(|| format!("Veo poll request failed ({url})"))?;
        let payload = response_json_or_error("Veo poll", response)?;
        Self::parse_operation(payload)
    }

    fn download(&self, api_key: &str, video: &GeneratedVideo, dest: &Path) -> Result<()> {
        if let Some(bytes) = video.bytes.as_ref() {
            fs::write(dest, bytes)
                .with_context(|| format!("failed to write {}", dest.display()))?;
            return Ok(());
        }
        let Some(uri) = video.uri.as_deref() else {
            bail!("Veo video has neither a download URI nor inline bytes");
        };
        let response = self
            .http
            .get(uri)
            .query(&[("key", api_key)])
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_S))
            .send()
            .with_context(|| format!("failed downloading Veo video ({uri})"))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            bail!(
                "Veo video download failed ({code}): {}",
                truncate_text(&body, 512)
            );
        }
        let bytes = response
            .bytes()
            .context("failed reading Veo video bytes")?;
        fs::write(dest, &bytes).with_context(|| format!("failed to write {}", dest.display()))?;
        Ok(())
    }
}

/// Offline provider: finishes after one poll and hands back a flat-colored
/// 9:16 PNG poster instead of a clip.
#[derive(Debug, Default)]
pub struct DryrunProvider;

impl DryrunProvider {
    const POSTER_WIDTH: u32 = 360;
    const POSTER_HEIGHT: u32 = 640;

    fn poster_png(color: Rgb<u8>) -> Result<Vec<u8>> {
        let image = RgbImage::from_pixel(Self::POSTER_WIDTH, Self::POSTER_HEIGHT, color);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("failed encoding dryrun poster")?;
        Ok(bytes)
    }

    fn color_from_name(name: &str) -> Rgb<u8> {
        let hex = name.rsplit('/').next().unwrap_or_default();
        let channel = |idx: usize| {
            hex.get(idx..idx + 2)
                .and_then(|value| u8::from_str_radix(value, 16).ok())
                .unwrap_or(128)
        };
        Rgb([channel(0), channel(2), channel(4)])
    }
}

impl VideoProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn submit(&self, _api_key: &str, request: &VideoRequest) -> Result<Operation> {
        if request.image_bytes.is_empty() {
            bail!("dryrun request has no start frame bytes");
        }
        let mut hasher = Sha256::new();
        hasher.update(request.prompt.as_bytes());
        hasher.update(request.duration_seconds.to_be_bytes());
        let digest = hasher.finalize();
        Ok(Operation::pending(format!(
            "dryrun/operations/{}",
            hex::encode(&digest[..3])
        )))
    }

    fn refresh(&self, _api_key: &str, operation: &Operation) -> Result<Operation> {
        let poster = Self::poster_png(Self::color_from_name(&operation.name))?;
        Ok(Operation {
            name: operation.name.clone(),
            done: true,
            error: None,
            videos: vec![GeneratedVideo {
                uri: None,
                bytes: Some(poster),
                mime_type: Some("image/png".to_string()),
            }],
            raw: json!({ "name": operation.name, "done": true }),
        })
    }

    fn download(&self, _api_key: &str, video: &GeneratedVideo, dest: &Path) -> Result<()> {
        let Some(bytes) = video.bytes.as_ref() else {
            bail!("dryrun video has no bytes");
        };
        fs::write(dest, bytes).with_context(|| format!("failed to write {}", dest.display()))?;
        Ok(())
    }
}

//! Central status normalization.
//!
//! Every provider reports task state in its own vocabulary and payload
//! shape. This module maps each raw payload (from `query` or a webhook,
//! which share a shape per channel) into one [`Observation`], and lists the
//! media assets a payload points at.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use mediagen_core::channels::{CanonicalStatus, Channel, MediaType};
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// A provider's report of a task, in canonical terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub provider_task_id: String,
    pub native_status: String,
    pub status: CanonicalStatus,
    pub progress: &'static str,
    pub fail_reason: Option<String>,
    /// Unix seconds, `0` when unknown.
    pub submit_time: i64,
    pub start_time: i64,
    pub finish_time: i64,
    /// Provider-reported completion time in Unix milliseconds.
    pub finished_at_ms: Option<i64>,
}

/// A media URL embedded in a status payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    /// JSON pointer of the URL inside the payload.
    pub pointer: String,
    pub url: String,
    pub extension: &'static str,
    pub media_type: MediaType,
}

/// Map a raw payload of `channel` into an [`Observation`].
pub fn normalize(channel: Channel, payload: &Value) -> Result<Observation, ProviderError> {
    let raw = match channel {
        Channel::Kling => kling(payload),
        Channel::Volcengine => volcengine(payload),
        Channel::Dashscope => dashscope(payload),
        Channel::Sora2 => sora2(payload),
    }
    .ok_or_else(|| {
        ProviderError::invalid_response(channel, "payload lacks a task id or status")
    })?;

    let fail_reason = match raw.status {
        CanonicalStatus::Failure => Some(
            raw.error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("{channel} task {}", raw.native_status)),
        ),
        _ => None,
    };
    let finished_at_ms = raw.finished_ms.filter(|_| raw.status.is_terminal());

    Ok(Observation {
        provider_task_id: raw.task_id,
        native_status: raw.native_status,
        status: raw.status,
        progress: raw.status.progress(),
        fail_reason,
        submit_time: raw.submitted_ms.map_or(0, ms_to_secs),
        start_time: raw.started_ms.or(raw.submitted_ms).map_or(0, ms_to_secs),
        finish_time: finished_at_ms.map_or(0, ms_to_secs),
        finished_at_ms,
    })
}

/// Media URLs in a payload, in a stable order. Non-HTTP values are skipped.
pub fn media_assets(channel: Channel, payload: &Value) -> Vec<MediaAsset> {
    let mut assets = Vec::new();
    let mut push = |pointer: String, extension: &'static str, media_type: MediaType| {
        if let Some(url) = payload.pointer(&pointer).and_then(Value::as_str) {
            if url.starts_with("http://") || url.starts_with("https://") {
                assets.push(MediaAsset {
                    pointer,
                    url: url.to_string(),
                    extension,
                    media_type,
                });
            }
        }
    };

    match channel {
        Channel::Kling => {
            let count = |key: &str| {
                payload
                    .pointer(&format!("/task_result/{key}"))
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len)
            };
            for i in 0..count("videos") {
                push(format!("/task_result/videos/{i}/url"), "mp4", MediaType::Video);
            }
            for i in 0..count("images") {
                push(format!("/task_result/images/{i}/url"), "png", MediaType::Image);
            }
        }
        Channel::Volcengine => {
            push("/content/video_url".into(), "mp4", MediaType::Video);
            push("/content/last_frame_url".into(), "png", MediaType::Image);
        }
        Channel::Dashscope => {
            push("/output/video_url".into(), "mp4", MediaType::Video);
        }
        Channel::Sora2 => {
            push("/video_url".into(), "mp4", MediaType::Video);
            push("/thumbnail_url".into(), "webp", MediaType::Image);
        }
    }
    assets
}

/// The caller-facing part of a payload: results, status and messages.
///
/// Keeps the payload's own nesting so asset pointers still resolve, and
/// never carries the provider's task id.
pub fn result_data(channel: Channel, payload: &Value) -> Value {
    let keys: &[&str] = match channel {
        Channel::Kling => &["task_status", "task_status_msg", "task_result"],
        Channel::Volcengine => &["status", "content", "usage", "error"],
        Channel::Dashscope => &["output", "usage"],
        Channel::Sora2 => &[
            "status",
            "progress",
            "video_url",
            "thumbnail_url",
            "duration",
            "size",
            "finish_reason",
            "error",
        ],
    };
    let mut data: Map<String, Value> = keys
        .iter()
        .filter_map(|key| payload.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect();
    if let Some(Value::Object(output)) = data.get_mut("output") {
        output.remove("task_id");
    }
    Value::Object(data)
}

// ---------------------------------------------------------------------------
// Per-channel extraction
// ---------------------------------------------------------------------------

struct RawObservation {
    task_id: String,
    native_status: String,
    status: CanonicalStatus,
    error: Option<String>,
    submitted_ms: Option<i64>,
    started_ms: Option<i64>,
    finished_ms: Option<i64>,
}

fn kling(payload: &Value) -> Option<RawObservation> {
    let native = str_at(payload, "/task_status")?;
    let status = match native.as_str() {
        "submitted" => CanonicalStatus::Submitted,
        "succeed" => CanonicalStatus::Success,
        "failed" => CanonicalStatus::Failure,
        _ => CanonicalStatus::InProgress,
    };
    let created = i64_at(payload, "/created_at");
    Some(RawObservation {
        task_id: str_at(payload, "/task_id")?,
        native_status: native,
        status,
        error: str_at(payload, "/task_status_msg"),
        submitted_ms: created,
        started_ms: created,
        finished_ms: i64_at(payload, "/updated_at"),
    })
}

fn volcengine(payload: &Value) -> Option<RawObservation> {
    let native = str_at(payload, "/status")?;
    let status = match native.as_str() {
        "queued" => CanonicalStatus::Submitted,
        "succeeded" => CanonicalStatus::Success,
        "failed" | "cancelled" => CanonicalStatus::Failure,
        _ => CanonicalStatus::InProgress,
    };
    let created = i64_at(payload, "/created_at").and_then(secs_to_ms);
    Some(RawObservation {
        task_id: str_at(payload, "/id")?,
        native_status: native,
        status,
        error: str_at(payload, "/error/message"),
        submitted_ms: created,
        started_ms: created,
        finished_ms: i64_at(payload, "/updated_at").and_then(secs_to_ms),
    })
}

fn dashscope(payload: &Value) -> Option<RawObservation> {
    let native = str_at(payload, "/output/task_status")?;
    let status = match native.as_str() {
        "PENDING" => CanonicalStatus::Submitted,
        "SUCCEEDED" => CanonicalStatus::Success,
        "FAILED" | "CANCELED" => CanonicalStatus::Failure,
        _ => CanonicalStatus::InProgress,
    };
    let time = |pointer: &str| str_at(payload, pointer).and_then(|s| parse_provider_time(&s));
    Some(RawObservation {
        task_id: str_at(payload, "/output/task_id")?,
        native_status: native,
        status,
        error: str_at(payload, "/output/message").or_else(|| str_at(payload, "/message")),
        submitted_ms: time("/output/submit_time"),
        started_ms: time("/output/scheduled_time"),
        finished_ms: time("/output/end_time"),
    })
}

fn sora2(payload: &Value) -> Option<RawObservation> {
    let native = str_at(payload, "/status")?;
    let status = match native.as_str() {
        "pending" => CanonicalStatus::Submitted,
        "completed" => CanonicalStatus::Success,
        "failed" | "cancelled" => CanonicalStatus::Failure,
        _ => CanonicalStatus::InProgress,
    };
    let error = str_at(payload, "/finish_reason")
        .or_else(|| str_at(payload, "/error/message"))
        .or_else(|| str_at(payload, "/error"));
    let created = i64_at(payload, "/created_at").and_then(epoch_to_ms);
    Some(RawObservation {
        task_id: str_at(payload, "/id")?,
        native_status: native,
        status,
        error,
        submitted_ms: created,
        started_ms: created,
        finished_ms: i64_at(payload, "/status_update_time").and_then(epoch_to_ms),
    })
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn str_at(payload: &Value, pointer: &str) -> Option<String> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Integers, tolerating providers that send them as strings or floats.
fn i64_at(payload: &Value, pointer: &str) -> Option<i64> {
    match payload.pointer(pointer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `None` when the value does not fit, which callers treat as unknown.
fn secs_to_ms(secs: i64) -> Option<i64> {
    secs.checked_mul(1000)
}

fn ms_to_secs(ms: i64) -> i64 {
    ms / 1000
}

/// Epoch value of unknown unit: anything past year 2286 in seconds is ms.
fn epoch_to_ms(value: i64) -> Option<i64> {
    if value >= 10_000_000_000 {
        Some(value)
    } else {
        secs_to_ms(value)
    }
}

/// Dashscope timestamps: `2025-01-08 16:43:20.101` in China Standard Time,
/// or RFC 3339.
fn parse_provider_time(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    let cst = FixedOffset::east_opt(8 * 3600)?;
    cst.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Inline prompt text commands (`a cat --ratio 16:9 --duration 5`).
//!
//! Volcengine reads generation parameters from `--key value` pairs appended
//! to the prompt text. Both directions are needed: parsing to price the
//! request, serializing to build the provider body.

use std::sync::LazyLock;

use regex::Regex;

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)--([A-Za-z]+)\s+([^\s-][^\s]*)").expect("valid regex")
});

/// Parameters recognised in text commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextCommandParams {
    pub resolution: Option<String>,
    pub ratio: Option<String>,
    pub duration: Option<u32>,
    pub frames_per_second: Option<u32>,
    pub watermark: Option<bool>,
    pub seed: Option<i64>,
    pub camera_fixed: Option<bool>,
}

/// A prompt with its commands split off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextCommand {
    pub prompt: String,
    pub params: TextCommandParams,
}

/// Split `text` into the bare prompt and the recognised parameters.
///
/// Unknown commands stay in the prompt. Later occurrences of a key win.
pub fn parse(text: &str) -> TextCommand {
    let mut params = TextCommandParams::default();
    let mut prompt = String::with_capacity(text.len());
    let mut last = 0;

    for caps in COMMAND_RE.captures_iter(text) {
        let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if !apply(&mut params, key.as_str(), value.as_str()) {
            continue;
        }
        prompt.push_str(&text[last..whole.start()]);
        last = whole.end();
    }
    prompt.push_str(&text[last..]);

    TextCommand {
        prompt: prompt.split_whitespace().collect::<Vec<_>>().join(" "),
        params,
    }
}

fn apply(params: &mut TextCommandParams, key: &str, value: &str) -> bool {
    match key {
        "resolution" | "rs" => params.resolution = Some(value.to_string()),
        "ratio" | "rt" => params.ratio = Some(value.to_string()),
        "duration" | "dur" => match value.parse() {
            Ok(v) => params.duration = Some(v),
            Err(_) => return false,
        },
        "framespersecond" | "fps" => match value.parse() {
            Ok(v) => params.frames_per_second = Some(v),
            Err(_) => return false,
        },
        "watermark" | "wm" => params.watermark = Some(value == "true"),
        "seed" => match value.parse() {
            Ok(v) => params.seed = Some(v),
            Err(_) => return false,
        },
        "camerafixed" | "cf" => params.camera_fixed = Some(value == "true"),
        _ => return false,
    }
    true
}

/// Render parameters back into `--key value` form, in a fixed order.
pub fn serialize(params: &TextCommandParams) -> String {
    let mut parts = Vec::new();
    if let Some(v) = &params.resolution {
        parts.push(format!("--resolution {v}"));
    }
    if let Some(v) = &params.ratio {
        parts.push(format!("--ratio {v}"));
    }
    if let Some(v) = params.duration {
        parts.push(format!("--duration {v}"));
    }
    if let Some(v) = params.frames_per_second {
        parts.push(format!("--framespersecond {v}"));
    }
    if let Some(v) = params.watermark {
        parts.push(format!("--watermark {v}"));
    }
    if let Some(v) = params.seed {
        parts.push(format!("--seed {v}"));
    }
    if let Some(v) = params.camera_fixed {
        parts.push(format!("--camerafixed {v}"));
    }
    parts.join(" ")
}

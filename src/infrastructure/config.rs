use crate::infrastructure::error::AppError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const ASSISTANT_JSON: &str = "assistant.json";

pub const DEFAULT_ASSISTANT_MODEL: &str = "anthropic/claude-3-haiku";
pub const DEFAULT_ASSISTANT_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub model: String,
    pub max_tokens: u32,
    pub referer: String,
    pub title: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_ASSISTANT_MODEL.to_string(),
            max_tokens: DEFAULT_ASSISTANT_MAX_TOKENS,
            referer: "https://app.local".to_string(),
            title: "StudyTrack".to_string(),
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "StudyTrack",
                "timezone": "UTC"
            }),
        ),
        (
            ASSISTANT_JSON,
            serde_json::json!({
                "schema": 1,
                "model": DEFAULT_ASSISTANT_MODEL,
                "maxTokens": DEFAULT_ASSISTANT_MAX_TOKENS,
                "referer": "https://app.local",
                "title": "StudyTrack"
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), AppError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, AppError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| AppError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(AppError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

/// The configured IANA timezone. Every "today" in the core (session dates,
/// rotation, streaks) is computed in this zone. Unparseable names fall back to
/// UTC rather than failing the operation.
pub fn read_timezone(config_dir: &Path) -> Tz {
    let Ok(app) = read_config(&config_dir.join(APP_JSON)) else {
        return Tz::UTC;
    };
    app.get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

pub fn read_assistant_settings(config_dir: &Path) -> Result<AssistantSettings, AppError> {
    let parsed = read_config(&config_dir.join(ASSISTANT_JSON))?;
    let mut settings = AssistantSettings::default();

    if let Some(model) = parsed
        .get("model")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        settings.model = model.to_string();
    }
    if let Some(max_tokens) = parsed.get("maxTokens").and_then(serde_json::Value::as_u64) {
        settings.max_tokens = max_tokens.min(u32::MAX as u64) as u32;
    }
    if let Some(referer) = parsed
        .get("referer")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        settings.referer = referer.to_string();
    }
    if let Some(title) = parsed
        .get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        settings.title = title.to_string();
    }

    Ok(settings)
}

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::time::Duration;
use tracing::warn;

use crate::retry::RetryPolicy;

const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_PERSONA_NAME: &str = "1950s Pulp Sci-Fi Narrator";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a bombastic, hyperbolic narrator from a 1950s Pulp \
     Science Fiction B-movie. Use terms like 'blast off,' 'cosmic,' 'alien menace,' 'ray gun,' \
     and 'space siren.' Your responses must be brief, thrilling, and over the top. Always use \
     ALL CAPS for maximum impact.";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_GOOGLE_SEARCH: bool = true;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_SECS: f64 = 1.0;
const DEFAULT_RETRY_STATUS_CODES: [u16; 3] = [429, 500, 503];

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub persona_name: String,
    pub system_prompt: String,
    pub model_timeout_secs: u64,
    pub google_search: bool,
    pub retry_policy: RetryPolicy,
}

// Hand-written so the credential never reaches a log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("persona_name", &self.persona_name)
            .field("system_prompt", &self.system_prompt)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("google_search", &self.google_search)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let api_key = resolve_api_key(
            get_var("GEMINI_API_KEY").as_deref(),
            get_var("GEMINI_API_KEY_FILE").as_deref(),
        );
        let retry_policy = RetryPolicy::new(
            parse_retry_max_attempts(get_var("RETRY_MAX_ATTEMPTS").as_deref()),
            parse_retry_base_delay(get_var("RETRY_BASE_DELAY_SECS").as_deref()),
            parse_retry_status_codes(get_var("RETRY_STATUS_CODES").as_deref()),
        );

        Self {
            api_key,
            model: non_blank(get_var("MODEL")).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: non_blank(get_var("API_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            persona_name: non_blank(get_var("PERSONA_NAME"))
                .unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string()),
            system_prompt: non_blank(get_var("SYSTEM_PROMPT"))
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            model_timeout_secs: parse_positive_u64(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
                DEFAULT_MODEL_TIMEOUT_SECS,
            ),
            google_search: parse_bool(
                get_var("GOOGLE_SEARCH").as_deref(),
                DEFAULT_GOOGLE_SEARCH,
            ),
            retry_policy,
        }
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

/// The environment variable wins; the key file is only read when it is unset or blank.
fn resolve_api_key(env_key: Option<&str>, key_file: Option<&str>) -> Option<String> {
    if let Some(key) = env_key.map(str::trim).filter(|key| !key.is_empty()) {
        return Some(key.to_string());
    }

    let path = key_file.map(str::trim).filter(|path| !path.is_empty())?;
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents.trim().to_string()).filter(|key| !key.is_empty()),
        Err(err) => {
            warn!(path = %path, error = %err, "failed to read GEMINI_API_KEY_FILE");
            None
        }
    }
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn parse_retry_max_attempts(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value >= 1)
        .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
}

fn parse_retry_base_delay(raw: Option<&str>) -> Duration {
    let secs = raw
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(DEFAULT_RETRY_BASE_DELAY_SECS);
    Duration::from_secs_f64(secs)
}

fn parse_retry_status_codes(raw: Option<&str>) -> BTreeSet<u16> {
    let parsed: Option<BTreeSet<u16>> = raw
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| {
            value
                .split(',')
                .map(|code| code.trim().parse::<u16>().ok().filter(|c| (100..=599).contains(c)))
                .collect()
        });

    parsed.unwrap_or_else(|| DEFAULT_RETRY_STATUS_CODES.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::fs;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::{
        Config, DEFAULT_API_BASE_URL, DEFAULT_GOOGLE_SEARCH, DEFAULT_MODEL,
        DEFAULT_MODEL_TIMEOUT_SECS, DEFAULT_PERSONA_NAME, DEFAULT_RETRY_MAX_ATTEMPTS,
        DEFAULT_SYSTEM_PROMPT, parse_bool, parse_retry_base_delay, parse_retry_max_attempts,
        parse_retry_status_codes, resolve_api_key,
    };

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::from_env_with(|key| vars.get(key).cloned())
    }

    fn temp_key_file(contents: &str) -> std::path::PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "persona-key-{stamp}-{}.txt",
            std::process::id()
        ));
        fs::write(&path, contents).expect("failed to write key file");
        path
    }

    #[test]
    fn from_env_uses_defaults_when_vars_are_missing() {
        let cfg = config_from_pairs(&[]);
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.persona_name, DEFAULT_PERSONA_NAME);
        assert_eq!(cfg.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(cfg.model_timeout_secs, DEFAULT_MODEL_TIMEOUT_SECS);
        assert_eq!(cfg.google_search, DEFAULT_GOOGLE_SEARCH);
        assert_eq!(cfg.retry_policy.max_attempts(), DEFAULT_RETRY_MAX_ATTEMPTS);
        assert_eq!(cfg.retry_policy.base_delay(), Duration::from_secs(1));
        assert_eq!(
            cfg.retry_policy.retryable_status_codes(),
            &BTreeSet::from([429, 500, 503])
        );
    }

    #[test]
    fn from_env_reads_configured_values() {
        let cfg = config_from_pairs(&[
            ("GEMINI_API_KEY", "secret"),
            ("MODEL", "gemini-2.5-pro"),
            ("API_BASE_URL", "http://localhost:9999/v1beta"),
            ("PERSONA_NAME", "Noir Detective"),
            ("SYSTEM_PROMPT", "Talk like a gumshoe."),
            ("MODEL_TIMEOUT_SECS", "15"),
            ("GOOGLE_SEARCH", "off"),
            ("RETRY_MAX_ATTEMPTS", "3"),
            ("RETRY_BASE_DELAY_SECS", "0.25"),
            ("RETRY_STATUS_CODES", "429, 502"),
        ]);

        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.model, "gemini-2.5-pro");
        assert_eq!(cfg.api_base_url, "http://localhost:9999/v1beta");
        assert_eq!(cfg.persona_name, "Noir Detective");
        assert_eq!(cfg.system_prompt, "Talk like a gumshoe.");
        assert_eq!(cfg.model_timeout_secs, 15);
        assert!(!cfg.google_search);
        assert_eq!(cfg.retry_policy.max_attempts(), 3);
        assert_eq!(cfg.retry_policy.base_delay(), Duration::from_millis(250));
        assert_eq!(
            cfg.retry_policy.retryable_status_codes(),
            &BTreeSet::from([429, 502])
        );
    }

    #[test]
    fn from_env_treats_blank_values_as_missing() {
        let cfg = config_from_pairs(&[
            ("GEMINI_API_KEY", "   "),
            ("MODEL", ""),
            ("SYSTEM_PROMPT", "  "),
        ]);
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = config_from_pairs(&[("GEMINI_API_KEY", "super-secret-key")]);
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret-key"), "{rendered}");
        assert!(rendered.contains("<redacted>"), "{rendered}");
    }

    #[test]
    fn resolve_api_key_prefers_environment_over_key_file() {
        let path = temp_key_file("from-file\n");
        let key = resolve_api_key(Some("from-env"), path.to_str());
        assert_eq!(key.as_deref(), Some("from-env"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn resolve_api_key_reads_trimmed_key_file_when_env_is_missing() {
        let path = temp_key_file("  from-file\n");
        let key = resolve_api_key(None, path.to_str());
        assert_eq!(key.as_deref(), Some("from-file"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn resolve_api_key_returns_none_for_missing_or_empty_key_file() {
        assert_eq!(resolve_api_key(None, Some("/nonexistent/persona/key")), None);
        assert_eq!(resolve_api_key(None, None), None);

        let path = temp_key_file("\n\n");
        assert_eq!(resolve_api_key(Some(""), path.to_str()), None);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn parse_bool_respects_truthy_and_falsy_values() {
        assert!(parse_bool(Some("true"), false));
        assert!(parse_bool(Some(" YES "), false));
        assert!(!parse_bool(Some("off"), true));
        assert!(!parse_bool(Some(" 0 "), true));
        assert!(parse_bool(Some("maybe"), true));
        assert!(!parse_bool(None, false));
    }

    #[test]
    fn parse_retry_max_attempts_rejects_zero_and_garbage() {
        assert_eq!(parse_retry_max_attempts(None), DEFAULT_RETRY_MAX_ATTEMPTS);
        assert_eq!(parse_retry_max_attempts(Some("0")), DEFAULT_RETRY_MAX_ATTEMPTS);
        assert_eq!(parse_retry_max_attempts(Some("-2")), DEFAULT_RETRY_MAX_ATTEMPTS);
        assert_eq!(parse_retry_max_attempts(Some(" 1 ")), 1);
    }

    #[test]
    fn parse_retry_base_delay_requires_positive_finite_seconds() {
        let default = Duration::from_secs(1);
        assert_eq!(parse_retry_base_delay(None), default);
        assert_eq!(parse_retry_base_delay(Some("0")), default);
        assert_eq!(parse_retry_base_delay(Some("-1.5")), default);
        assert_eq!(parse_retry_base_delay(Some("NaN")), default);
        assert_eq!(parse_retry_base_delay(Some("inf")), default);
        assert_eq!(parse_retry_base_delay(Some("2.5")), Duration::from_millis(2500));
    }

    #[test]
    fn parse_retry_status_codes_falls_back_when_any_entry_is_invalid() {
        let default = BTreeSet::from([429, 500, 503]);
        assert_eq!(parse_retry_status_codes(None), default);
        assert_eq!(parse_retry_status_codes(Some("  ")), default);
        assert_eq!(parse_retry_status_codes(Some("429,abc")), default);
        assert_eq!(parse_retry_status_codes(Some("429,42")), default);
        assert_eq!(
            parse_retry_status_codes(Some("503")),
            BTreeSet::from([503])
        );
    }
}

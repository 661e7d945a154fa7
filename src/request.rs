/*!
 * Transfer requests, boolean flag parsing and locator templating
 */

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Immutable description of one object copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    source: String,
    target: String,
    chunk_size: u64,
    max_workers: usize,
    checksum: bool,
    encryption_key: Option<String>,
}

impl TransferRequest {
    /// Start a request with default chunk size, workers and checksum setting
    pub fn builder(source: impl Into<String>, target: impl Into<String>) -> TransferRequestBuilder {
        let defaults = RelayConfig::default();
        TransferRequestBuilder {
            source: source.into(),
            target: target.into(),
            chunk_size: defaults.chunk_size,
            max_workers: defaults.max_workers,
            checksum: defaults.checksum,
            encryption_key: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// 0 and 1 both mean sequential
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn checksum(&self) -> bool {
        self.checksum
    }

    pub fn encryption_key(&self) -> Option<&str> {
        self.encryption_key.as_deref()
    }
}

/// Builder for [`TransferRequest`]
#[derive(Debug, Clone)]
pub struct TransferRequestBuilder {
    source: String,
    target: String,
    chunk_size: u64,
    max_workers: usize,
    checksum: bool,
    encryption_key: Option<String>,
}

impl TransferRequestBuilder {
    /// Take chunk size, workers and checksum from a configuration
    pub fn defaults_from(mut self, config: &RelayConfig) -> Self {
        self.chunk_size = config.chunk_size;
        self.max_workers = config.max_workers;
        self.checksum = config.checksum;
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    /// Server-side encryption key reference; empty strings are ignored
    pub fn encryption_key(mut self, key: Option<String>) -> Self {
        self.encryption_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Expand time placeholders in both locators using the current local time
    pub fn expand_templates(self) -> Result<Self> {
        self.expand_templates_at(&Local::now())
    }

    /// Expand time placeholders in both locators using `now`
    pub fn expand_templates_at(mut self, now: &DateTime<Local>) -> Result<Self> {
        self.source = expand_locator(&self.source, now)?;
        self.target = expand_locator(&self.target, now)?;
        Ok(self)
    }

    pub fn build(self) -> Result<TransferRequest> {
        if self.chunk_size == 0 {
            return Err(RelayError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.source.trim().is_empty() || self.target.trim().is_empty() {
            return Err(RelayError::Config(
                "source and target locators are required".to_string(),
            ));
        }

        Ok(TransferRequest {
            source: self.source,
            target: self.target,
            chunk_size: self.chunk_size,
            max_workers: self.max_workers,
            checksum: self.checksum,
            encryption_key: self.encryption_key,
        })
    }
}

/// Boolean option as it arrives from payloads and command lines
///
/// Accepts JSON booleans and, case-insensitively, `true/yes/y/1` and
/// `false/no/n/0/""`. Everything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flag(pub bool);

impl Flag {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(Flag(true)),
            "false" | "no" | "n" | "0" | "" => Ok(Flag(false)),
            other => Err(RelayError::Config(format!(
                "invalid boolean flag `{}` (expected true/false, yes/no, y/n or 1/0)",
                other
            ))),
        }
    }

    pub fn get(self) -> bool {
        self.0
    }
}

impl std::str::FromStr for Flag {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        Flag::parse(s)
    }
}

impl From<Flag> for bool {
    fn from(flag: Flag) -> bool {
        flag.0
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(Flag(b)),
            Raw::Text(s) => Flag::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Expand `{}` / `{0}` / `{:FMT}` / `{0:FMT}` placeholders in a locator
///
/// `FMT` is a strftime pattern; a bare placeholder becomes the full local
/// timestamp. `{{` and `}}` produce literal braces.
pub fn expand_locator(locator: &str, now: &DateTime<Local>) -> Result<String> {
    let invalid = |reason: String| RelayError::InvalidLocator {
        locator: locator.to_string(),
        reason,
    };

    let mut out = String::with_capacity(locator.len());
    let mut rest = locator;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
            continue;
        }
        if tail.starts_with('}') {
            return Err(invalid("unmatched `}` in template".to_string()));
        }

        let close = tail
            .find('}')
            .ok_or_else(|| invalid("unclosed `{` in template".to_string()))?;
        let field = &tail[1..close];
        let (index, format) = match field.split_once(':') {
            Some((index, format)) => (index, Some(format)),
            None => (field, None),
        };
        if !index.is_empty() && index != "0" {
            return Err(invalid(format!("unsupported placeholder `{{{}}}`", field)));
        }

        match format {
            Some(format) => {
                let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
                if items.iter().any(|item| matches!(item, Item::Error)) {
                    return Err(invalid(format!("invalid time format `{}`", format)));
                }
                write!(out, "{}", now.format_with_items(items.into_iter()))
                    .map_err(|e| invalid(e.to_string()))?;
            }
            None => {
                write!(out, "{}", now.format("%Y-%m-%d %H:%M:%S%.6f"))
                    .map_err(|e| invalid(e.to_string()))?;
            }
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single().unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let request = TransferRequest::builder("gs://a/b", "s3://c/d").build().unwrap();
        assert_eq!(request.chunk_size(), 64 * 1024 * 1024);
        assert_eq!(request.max_workers(), 2);
        assert!(!request.checksum());
        assert_eq!(request.encryption_key(), None);
    }

    #[test]
    fn test_builder_zero_chunk_rejected() {
        let err = TransferRequest::builder("gs://a/b", "s3://c/d")
            .chunk_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_blank_encryption_key_ignored() {
        let request = TransferRequest::builder("gs://a/b", "s3://c/d")
            .encryption_key(Some("  ".to_string()))
            .build()
            .unwrap();
        assert_eq!(request.encryption_key(), None);
    }

    #[test]
    fn test_flag_values() {
        for truthy in ["true", "True", "YES", "y", "1"] {
            assert!(Flag::parse(truthy).unwrap().get(), "{truthy}");
        }
        for falsy in ["false", "No", "n", "0", ""] {
            assert!(!Flag::parse(falsy).unwrap().get(), "{falsy}");
        }
        assert!(Flag::parse("maybe").is_err());
        assert!(Flag::parse("2").is_err());
    }

    #[test]
    fn test_flag_from_json() {
        let flags: Vec<Flag> = serde_json::from_str(r#"[true, false, "Yes", "0"]"#).unwrap();
        assert_eq!(flags, vec![Flag(true), Flag(false), Flag(true), Flag(false)]);
        assert!(serde_json::from_str::<Flag>(r#""sometimes""#).is_err());
        assert!(serde_json::from_str::<Flag>("1").is_err());
    }

    #[test]
    fn test_expand_date_template() {
        let now = fixed_time();
        let expanded = expand_locator("gs://bucket/export/{0:%Y-%m-%d}/data.csv", &now).unwrap();
        assert_eq!(expanded, "gs://bucket/export/2024-03-09/data.csv");

        let expanded = expand_locator("s3://bucket/hour={:%H}/part", &now).unwrap();
        assert_eq!(expanded, "s3://bucket/hour=07/part");
    }

    #[test]
    fn test_expand_bare_placeholder() {
        let expanded = expand_locator("s3://bucket/{}", &fixed_time()).unwrap();
        assert_eq!(expanded, "s3://bucket/2024-03-09 07:05:01.000000");
    }

    #[test]
    fn test_plain_locator_unchanged() {
        let locator = "gs://bucket/dir/file name.bin";
        assert_eq!(expand_locator(locator, &fixed_time()).unwrap(), locator);
    }

    #[test]
    fn test_escaped_braces() {
        let expanded = expand_locator("s3://bucket/{{literal}}", &fixed_time()).unwrap();
        assert_eq!(expanded, "s3://bucket/{literal}");
    }

    #[test]
    fn test_bad_templates() {
        let now = fixed_time();
        assert!(expand_locator("s3://bucket/{", &now).is_err());
        assert!(expand_locator("s3://bucket/}", &now).is_err());
        assert!(expand_locator("s3://bucket/{1}", &now).is_err());
        assert!(expand_locator("s3://bucket/{name}", &now).is_err());
    }

    #[test]
    fn test_builder_expands_both_locators() {
        let request = TransferRequest::builder("gs://a/{0:%Y}/x", "s3://b/{0:%m}/x")
            .expand_templates_at(&fixed_time())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.source(), "gs://a/2024/x");
        assert_eq!(request.target(), "s3://b/03/x");
    }
}

use super::{RawValue, Section};
use crate::error::ConfigError;

/// Boolean vocabulary: yes/no, true/false, on/off, 1/0 (case-insensitive).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_int(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

pub fn parse_float(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

impl Section {
    fn invalid_value(&self, key: &str, value: &str, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.label().to_string(),
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    fn single(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(RawValue::Single(value)) => Ok(Some(value)),
            Some(RawValue::List(items)) => {
                Err(self.invalid_value(key, &items.join(", "), "a single value"))
            }
        }
    }

    /// Text value with tab characters removed.
    pub fn text(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.single(key)?.map(|value| value.replace('\t', "")))
    }

    /// Text value whose commas are kept as written.
    ///
    /// Prose such as prompts may contain commas, which the document reads as list
    /// separators; the items are joined back together.
    pub fn prose(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| match value {
            RawValue::Single(text) => text.replace('\t', ""),
            RawValue::List(items) => items.join(", ").replace('\t', ""),
        })
    }

    pub fn require_text(&self, key: &str) -> Result<String, ConfigError> {
        self.text(key)?
            .ok_or_else(|| ConfigError::missing(self.label(), key))
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.single(key)? {
            None => Ok(default),
            Some(value) => {
                parse_bool(value).ok_or_else(|| self.invalid_value(key, value, "yes or no"))
            }
        }
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.single(key)? {
            None => Ok(None),
            Some(value) => parse_int(value)
                .map(Some)
                .ok_or_else(|| self.invalid_value(key, value, "an integer")),
        }
    }

    pub fn require_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.int(key)?
            .ok_or_else(|| ConfigError::missing(self.label(), key))
    }

    pub fn float(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.single(key)? {
            None => Ok(None),
            Some(value) => parse_float(value)
                .map(Some)
                .ok_or_else(|| self.invalid_value(key, value, "a number")),
        }
    }

    pub fn require_float(&self, key: &str) -> Result<f64, ConfigError> {
        self.float(key)?
            .ok_or_else(|| ConfigError::missing(self.label(), key))
    }

    /// List value; a single value is a one-item list. Items are trimmed of tabs.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|value| {
            value
                .items()
                .into_iter()
                .map(|item| item.replace('\t', ""))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse;

    #[test]
    fn bool_vocabulary() {
        for yes in ["yes", "True", "ON", "1"] {
            assert_eq!(parse_bool(yes), Some(true), "{yes}");
        }
        for no in ["no", "False", "off", "0"] {
            assert_eq!(parse_bool(no), Some(false), "{no}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn typed_accessors_report_section() {
        let doc = parse("[part 1]\nrandomise = perhaps\ninterval = 2.5\n").expect("parse");
        let part = doc.section("part 1").expect("part");
        let err = part.flag("randomise", false).expect_err("bad flag");
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                section: "part 1".into(),
                key: "randomise".into(),
                value: "perhaps".into(),
                expected: "yes or no",
            }
        );
        assert!(part.int("interval").is_err());
        assert_eq!(part.flag("missing", true), Ok(true));
    }

    #[test]
    fn prose_keeps_commas() {
        let doc = parse("text = Well, that was it\n").expect("parse");
        assert_eq!(doc.prose("text").as_deref(), Some("Well, that was it"));
        assert!(doc.text("text").is_err());
    }
}

//! Query rule definitions.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A named query expression sent to the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Unique identifier, also used in output file names
    pub tag: String,

    /// Query expression
    pub value: String,
}

impl Rule {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// Check that the tag is usable as a file name fragment and the query is present.
    pub fn validate(&self) -> Result<()> {
        if !is_file_safe(&self.tag) {
            return Err(AppError::config(format!(
                "Rule tag '{}' must match [A-Za-z0-9_-]+",
                self.tag
            )));
        }
        if self.value.trim().is_empty() {
            return Err(AppError::config(format!(
                "Rule '{}' has an empty query value",
                self.tag
            )));
        }
        Ok(())
    }
}

/// Tags end up in file names: ASCII letters, digits, `_` and `-` only.
static TAG_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

fn is_file_safe(tag: &str) -> bool {
    TAG_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(tag))
}

//! Language catalogue entries.
//!
//! A `Language` maps the numeric id stored on queries and user preferences
//! to the BCP-47 style code the speech and translation services expect.

use serde::{Deserialize, Serialize};

/// Language id assumed when a request does not specify one.
pub const DEFAULT_LANGUAGE_ID: i64 = 1;

/// Language code assumed when an id cannot be resolved.
pub const DEFAULT_LANGUAGE_CODE: &str = "en-IN";

/// A supported spoken language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    /// Service-facing code such as `hi-IN`.
    pub code: String,
    /// Human-readable name such as `Hindi`.
    pub name: String,
}

impl Language {
    /// The fallback language used when nothing else is known.
    pub fn fallback() -> Self {
        Self {
            id: DEFAULT_LANGUAGE_ID,
            code: DEFAULT_LANGUAGE_CODE.to_string(),
            name: "English".to_string(),
        }
    }

    /// Whether two languages are the same for speech purposes.
    pub fn same_code(&self, other: &Language) -> bool {
        self.code.eq_ignore_ascii_case(&other.code)
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::fallback()
    }
}

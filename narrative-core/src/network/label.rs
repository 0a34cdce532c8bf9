//! Lenient parsing for closed vocabularies.
//!
//! Model output names enumerated values loosely ("de-escalating", "Love",
//! "highly complex"). Every vocabulary in the crate implements [`Label`] so a
//! raw string always resolves to a variant, falling back to the type's
//! default when nothing matches.

use serde::{Deserialize, Deserializer};

/// Uppercase the input and turn spaces and hyphens into underscores.
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// A closed vocabulary that can be parsed from free-form text.
pub trait Label: Sized + Copy + Default + 'static {
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// Canonical label used when serializing and when matching input.
    fn as_str(&self) -> &'static str;

    /// Match a raw string against the vocabulary.
    ///
    /// Matching ignores case and treats spaces, hyphens and underscores as
    /// interchangeable separators; a label whose separators were dropped
    /// entirely (`DE-ESCALATING` against `DEESCALATING`) also matches.
    fn from_label(raw: &str) -> Option<Self> {
        let normalized = normalize_label(raw);
        if normalized.is_empty() {
            return None;
        }
        let squashed = normalized.replace('_', "");
        Self::ALL.iter().copied().find(|variant| {
            let canonical = normalize_label(variant.as_str());
            canonical == normalized || canonical.replace('_', "") == squashed
        })
    }

    /// Parse a raw string, falling back to the default variant.
    fn parse(raw: &str) -> Self {
        Self::from_label(raw).unwrap_or_default()
    }
}

/// Serde adapter that accepts any JSON value and resolves it through
/// [`Label::parse`]. Non-string values yield the default variant.
pub fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Label,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => T::parse(&s),
        _ => T::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  de-escalating "), "DE_ESCALATING");
        assert_eq!(normalize_label("highly complex"), "HIGHLY_COMPLEX");
        assert_eq!(normalize_label(""), "");
    }
}

//! Location input normalization.
//!
//! Raw form input becomes a [`LocationKey`] or is rejected. The key carries
//! two forms: a lowercase canonical form used for caching, and the caller's
//! spelling used to query the provider.

use unicode_normalization::UnicodeNormalization;
use wxcache_core::WeatherError;

/// Longest accepted location, in characters, after whitespace is collapsed.
pub const MAX_LOCATION_LEN: usize = 100;

/// Punctuation allowed besides letters, digits and spaces.
const ALLOWED_PUNCTUATION: &[char] = &[',', '.', '-', '\''];

/// A validated city name or ZIP code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    query: String,
    canonical: String,
}

impl LocationKey {
    /// Validate and canonicalize raw input.
    ///
    /// Input is NFC-normalized, surrounding whitespace is trimmed and
    /// internal runs collapse to one space. Empty, overlong, out-of-alphabet
    /// or punctuation-only input is rejected with
    /// [`WeatherError::InvalidInput`].
    pub fn parse(raw: &str) -> Result<Self, WeatherError> {
        let composed: String = raw.nfc().collect();
        let query = composed.split_whitespace().collect::<Vec<_>>().join(" ");

        if query.is_empty() {
            return Err(WeatherError::InvalidInput("location cannot be empty".into()));
        }

        let len = query.chars().count();
        if len > MAX_LOCATION_LEN {
            return Err(WeatherError::InvalidInput(format!(
                "location is {} characters, limit is {}",
                len, MAX_LOCATION_LEN
            )));
        }

        if let Some(bad) = query
            .chars()
            .find(|c| !(c.is_alphanumeric() || *c == ' ' || ALLOWED_PUNCTUATION.contains(c)))
        {
            return Err(WeatherError::InvalidInput(format!(
                "unsupported character {:?} in location",
                bad
            )));
        }

        // "." and ".." would be resolved as dot segments in the upstream path.
        if !query.chars().any(char::is_alphanumeric) {
            return Err(WeatherError::InvalidInput(
                "location must contain a letter or digit".into(),
            ));
        }

        let canonical = query.to_lowercase();
        Ok(Self { query, canonical })
    }

    /// Cache identity: case-insensitive, independent of provider syntax.
    pub fn cache_key(&self) -> &str {
        &self.canonical
    }

    /// The caller's spelling, sent to the provider as a path segment.
    pub fn query_token(&self) -> &str {
        &self.query
    }

    /// The location escaped for embedding in an HTML document.
    pub fn display_html(&self) -> String {
        escape_html(&self.query)
    }
}

impl std::fmt::Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.query)
    }
}

/// Escape the characters that are meaningful in HTML text and attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_collapses_whitespace() {
        let key = LocationKey::parse("  New    York \t").unwrap();
        assert_eq!(key.query_token(), "New York");
        assert_eq!(key.cache_key(), "new york");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            LocationKey::parse(""),
            Err(WeatherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_whitespace_only_rejected() {
        assert!(matches!(
            LocationKey::parse(" \t\n  "),
            Err(WeatherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zip_codes_accepted() {
        assert_eq!(LocationKey::parse("90210").unwrap().cache_key(), "90210");
        assert_eq!(LocationKey::parse("02134-1234").unwrap().cache_key(), "02134-1234");
    }

    #[test]
    fn test_punctuated_names_accepted() {
        assert!(LocationKey::parse("St. John's").is_ok());
        assert!(LocationKey::parse("Portland, OR").is_ok());
        assert!(LocationKey::parse("São Paulo").is_ok());
        assert!(LocationKey::parse("Wilkes-Barre").is_ok());
    }

    #[test]
    fn test_markup_and_path_characters_rejected() {
        for raw in ["<script>", "London/../admin", "Paris?key=x", "a&b", "Rome%20"] {
            assert!(
                matches!(LocationKey::parse(raw), Err(WeatherError::InvalidInput(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_dot_segments_rejected() {
        for raw in [".", "..", " ... ", "-", "', ."] {
            assert!(
                matches!(LocationKey::parse(raw), Err(WeatherError::InvalidInput(_))),
                "{raw:?} should be rejected"
            );
        }
        assert!(LocationKey::parse("St. Louis").is_ok());
    }

    #[test]
    fn test_decomposed_accents_accepted() {
        let decomposed = LocationKey::parse("Sa\u{0303}o Paulo").unwrap();
        let composed = LocationKey::parse("S\u{e3}o Paulo").unwrap();
        assert_eq!(decomposed.cache_key(), composed.cache_key());
        assert_eq!(decomposed.query_token(), "S\u{e3}o Paulo");
    }

    #[test]
    fn test_length_limit() {
        let at_limit = "a".repeat(MAX_LOCATION_LEN);
        assert!(LocationKey::parse(&at_limit).is_ok());

        let over = "a".repeat(MAX_LOCATION_LEN + 1);
        assert!(matches!(
            LocationKey::parse(&over),
            Err(WeatherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cache_key_is_case_insensitive() {
        let a = LocationKey::parse("London").unwrap();
        let b = LocationKey::parse("  LONDON ").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.query_token(), b.query_token());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
        assert_eq!(
            LocationKey::parse("St. John's").unwrap().display_html(),
            "St. John&#39;s"
        );
    }
}

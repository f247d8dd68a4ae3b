//! Flat property encoding shared by engine start and recognition calls.
//!
//! ## Wire format
//!
//! ```text
//! key1=value1|key2=value2|...
//! ```
//!
//! Both separators are configurable ([`Separators`]) and there is no escaping:
//! a key or value containing either separator is rejected with
//! [`OcrError::InvalidConfiguration`] before anything crosses the boundary.
//!
//! `decode` is lenient: tokens that are blank, have an empty key,
//! or do not contain exactly one key/value separator are dropped.

pub mod builder;

pub use builder::{ImagePreprocessing, PageType, PropertyBuilder};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Separators;
use crate::error::{OcrError, Result};

/// Option-name → option-value mapping with unique keys.
///
/// Iteration (and therefore encoding) is ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySet(BTreeMap<String, String>);

impl PropertySet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for `key` if present and not blank.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `defaults` overlaid with `self`; keys in `self` win.
    pub fn layered_over(&self, defaults: &PropertySet) -> PropertySet {
        let mut merged = defaults.clone();
        for (k, v) in &self.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Check every key and value against the reserved separators.
    ///
    /// NUL can not cross the native boundary and is an `InvalidArgument`;
    /// the other violations are `InvalidConfiguration`.
    pub fn validate(&self, seps: Separators) -> Result<()> {
        for (key, value) in &self.0 {
            if key.trim().is_empty() {
                return Err(OcrError::config(format!(
                    "property key can not be empty (value: {value:?})"
                )));
            }
            if key.contains('\0') || value.contains('\0') {
                return Err(OcrError::argument(format!("property {key:?} contains NUL")));
            }
            for sep in [seps.pair, seps.key_value] {
                if key.contains(sep) {
                    return Err(OcrError::config(format!(
                        "property key {key:?} contains reserved separator {sep:?}; \
                         choose different separators"
                    )));
                }
                if value.contains(sep) {
                    return Err(OcrError::config(format!(
                        "value of property {key:?} contains reserved separator {sep:?}; \
                         choose different separators"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a PropertySet {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Encode a property set as one delimited line.
///
/// # Errors
/// `OcrError::InvalidConfiguration` if any key/value contains a separator,
/// `OcrError::InvalidArgument` if one contains NUL.
pub fn encode(props: &PropertySet, seps: Separators) -> Result<String> {
    props.validate(seps)?;
    let mut out = String::new();
    for (key, value) in props.iter() {
        if !out.is_empty() {
            out.push(seps.pair);
        }
        out.push_str(key);
        out.push(seps.key_value);
        out.push_str(value);
    }
    Ok(out)
}

/// Decode a delimited line. Malformed tokens are skipped, never rejected.
pub fn decode(encoded: &str, seps: Separators) -> PropertySet {
    let mut props = PropertySet::new();
    for token in encoded.split(seps.pair) {
        if token.trim().is_empty() {
            continue;
        }
        let mut parts = token.split(seps.key_value);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) if !key.trim().is_empty() => {
                props.insert(key, value);
            }
            _ => debug!(token, "skipping malformed property token"),
        }
    }
    props
}

/// The shapes accepted wherever properties are passed in.
///
/// All shapes normalise to the same [`PropertySet`] for the same options.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PropertySpec {
    #[default]
    None,
    /// A pre-encoded line, e.g. `"PROP_PAGE_TYPE=single_line|PROP_INPUT_PDF_DPI=300"`.
    Encoded(String),
    /// A pre-built set.
    Set(PropertySet),
    /// Alternating key, value, key, value … `None` entries are rejected.
    Pairs(Vec<Option<String>>),
}

impl PropertySpec {
    /// Alternating key/value items from anything string-like.
    pub fn pairs<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Pairs(items.into_iter().map(|s| Some(s.into())).collect())
    }

    /// Resolve to a validated property set.
    ///
    /// # Errors
    /// `OcrError::InvalidConfiguration` for an odd number of pair items, a
    /// missing key or value, an empty key, or a reserved separator.
    pub fn normalize(&self, seps: Separators) -> Result<PropertySet> {
        let props = match self {
            Self::None => PropertySet::new(),
            Self::Encoded(line) => decode(line, seps),
            Self::Set(set) => set.clone(),
            Self::Pairs(items) => {
                if items.len() % 2 != 0 {
                    return Err(OcrError::config(format!(
                        "property pairs must come in key/value pairs, got {} items",
                        items.len()
                    )));
                }
                let mut set = PropertySet::new();
                for pair in items.chunks_exact(2) {
                    match (&pair[0], &pair[1]) {
                        (Some(key), Some(value)) => {
                            set.insert(key.clone(), value.clone());
                        }
                        (key, value) => {
                            return Err(OcrError::config(format!(
                                "neither key nor value of a property can be null: {key:?}={value:?}"
                            )));
                        }
                    }
                }
                set
            }
        };
        props.validate(seps)?;
        Ok(props)
    }
}

impl From<&str> for PropertySpec {
    fn from(line: &str) -> Self {
        Self::Encoded(line.to_string())
    }
}

impl From<String> for PropertySpec {
    fn from(line: String) -> Self {
        Self::Encoded(line)
    }
}

impl From<PropertySet> for PropertySpec {
    fn from(set: PropertySet) -> Self {
        Self::Set(set)
    }
}

impl From<PropertyBuilder> for PropertySpec {
    fn from(builder: PropertyBuilder) -> Self {
        Self::Set(builder.build())
    }
}

impl From<Option<PropertySet>> for PropertySpec {
    fn from(set: Option<PropertySet>) -> Self {
        set.map(Self::Set).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seps() -> Separators {
        Separators::default()
    }

    fn sample() -> PropertySet {
        [
            ("PROP_PAGE_TYPE", "single_line"),
            ("PROP_INPUT_PDF_DPI", "300"),
            ("PROP_PDF_OUTPUT_FONT", ""),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn encode_joins_sorted_pairs() {
        let encoded = encode(&sample(), seps()).expect("encode sample");
        assert_eq!(
            encoded,
            "PROP_INPUT_PDF_DPI=300|PROP_PAGE_TYPE=single_line|PROP_PDF_OUTPUT_FONT="
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let props = sample();
        let encoded = encode(&props, seps()).expect("encode sample");
        assert_eq!(decode(&encoded, seps()), props);
    }

    #[test]
    fn decode_inverts_encode_with_custom_separators() {
        let seps = Separators::new(';', ':').expect("separators");
        let mut props = sample();
        props.insert("PROP_LIMIT_TO_CHARSET", "a|b=c");
        let encoded = encode(&props, seps).expect("encode with custom separators");
        assert_eq!(decode(&encoded, seps), props);
    }

    #[test]
    fn decode_skips_malformed_tokens() {
        let props = decode("a=1||b|c=2=3|=4|  |d=5", seps());
        let expected: PropertySet = [("a", "1"), ("d", "5")].into_iter().collect();
        assert_eq!(props, expected);
    }

    #[test]
    fn decode_later_duplicates_win() {
        let props = decode("a=1|a=2", seps());
        assert_eq!(props.get("a"), Some("2"));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn encode_rejects_reserved_characters() {
        let mut in_value = PropertySet::new();
        in_value.insert("PROP_LIMIT_TO_CHARSET", "a|b");
        assert!(matches!(
            encode(&in_value, seps()),
            Err(OcrError::InvalidConfiguration(_))
        ));

        let mut in_key = PropertySet::new();
        in_key.insert("A=B", "x");
        assert!(matches!(
            encode(&in_key, seps()),
            Err(OcrError::InvalidConfiguration(_))
        ));

        let mut kv_in_value = PropertySet::new();
        kv_in_value.insert("k", "x=y");
        assert!(matches!(
            encode(&kv_in_value, seps()),
            Err(OcrError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn nul_in_key_or_value_is_an_invalid_argument() {
        let mut in_value = PropertySet::new();
        in_value.insert("PROP_LIMIT_TO_CHARSET", "a\0b");
        let err = encode(&in_value, seps()).expect_err("NUL value");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert!(err.is_local());

        let mut in_key = PropertySet::new();
        in_key.insert("PROP\0PAGE_TYPE", "auto");
        assert!(matches!(in_key.validate(seps()), Err(OcrError::InvalidArgument(_))));
    }

    #[test]
    fn three_spec_shapes_normalize_identically() {
        let encoded = PropertySpec::from("PROP_PAGE_TYPE=single_line|PROP_INPUT_PDF_DPI=300");
        let set = PropertySpec::from(
            [("PROP_PAGE_TYPE", "single_line"), ("PROP_INPUT_PDF_DPI", "300")]
                .into_iter()
                .collect::<PropertySet>(),
        );
        let pairs = PropertySpec::pairs([
            "PROP_INPUT_PDF_DPI",
            "300",
            "PROP_PAGE_TYPE",
            "single_line",
        ]);

        let a = encoded.normalize(seps()).expect("encoded");
        let b = set.normalize(seps()).expect("set");
        let c = pairs.normalize(seps()).expect("pairs");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn pairs_reject_null_and_odd_counts() {
        let null_value = PropertySpec::Pairs(vec![Some("k".into()), None]);
        assert!(matches!(
            null_value.normalize(seps()),
            Err(OcrError::InvalidConfiguration(_))
        ));

        let null_key = PropertySpec::Pairs(vec![None, Some("v".into())]);
        assert!(matches!(
            null_key.normalize(seps()),
            Err(OcrError::InvalidConfiguration(_))
        ));

        let odd = PropertySpec::pairs(["k", "v", "dangling"]);
        assert!(matches!(
            odd.normalize(seps()),
            Err(OcrError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn empty_specs_normalize_to_empty_set() {
        assert!(PropertySpec::None.normalize(seps()).expect("none").is_empty());
        assert!(PropertySpec::from("").normalize(seps()).expect("empty line").is_empty());
    }

    #[test]
    fn layered_over_prefers_own_values() {
        let defaults: PropertySet = [("a", "1"), ("b", "1")].into_iter().collect();
        let own: PropertySet = [("b", "2")].into_iter().collect();
        let merged = own.layered_over(&defaults);
        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.get("b"), Some("2"));
    }
}

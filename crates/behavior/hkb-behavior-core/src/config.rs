//! Core configuration for hkb-behavior-core.

use serde::{Deserialize, Serialize};

/// Settings a host passes when loading a behavior.
/// Persisting them is up to the host; this only needs to round-trip through serde.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of undo frames kept; the oldest are evicted first.
    pub undo_depth: usize,

    /// Prefix for freshly allocated object ids.
    pub id_prefix: String,

    /// Fuzzy query terms (`~term`) match when the partial similarity is above this score.
    pub fuzzy_threshold: u8,

    /// Force the decimal separator used when encoding reals.
    /// `None` detects it from the loaded document.
    pub decimal_comma: Option<bool>,

    /// Target used for every log record emitted by the behavior.
    /// `None` derives one from the document name.
    pub log_target: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            undo_depth: 100,
            id_prefix: "object".to_string(),
            fuzzy_threshold: 80,
            decimal_comma: None,
            log_target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "undo_depth": 5 }"#).unwrap();
        assert_eq!(cfg.undo_depth, 5);
        assert_eq!(cfg.id_prefix, "object");
        assert_eq!(cfg.fuzzy_threshold, 80);
        assert!(cfg.decimal_comma.is_none());
    }
}

//! Descriptor file tokenizer.
//!
//! The deployment descriptor is plain `key = value` text where a key may
//! repeat to form a multi-valued entry (`code`, `resource`, `jvmarg`,
//! `apparg`). This module only tokenizes; typed interpretation lives in
//! [`crate::descriptor`].

use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// Parsed key/value mapping. Repeated keys are kept in file order.
#[derive(Debug, Default, Clone)]
pub struct ConfigMap {
    entries: Vec<(String, String)>,
}

impl ConfigMap {
    /// Read and tokenize a descriptor file.
    pub fn parse_file(path: &Path) -> io::Result<ConfigMap> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Tokenize descriptor text. Blank lines and `#` comments are skipped;
    /// lines without a `=` separator are warned about and dropped.
    pub fn parse(text: &str) -> ConfigMap {
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("Skipping malformed descriptor line '{}'", line);
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                warn!("Skipping descriptor line with empty key '{}'", line);
                continue;
            }
            entries.push((key.to_string(), value.trim().to_string()));
        }
        ConfigMap { entries }
    }

    /// First value recorded for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value recorded for `key`, in file order.
    pub fn get_multi(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_values() {
        let cfg = ConfigMap::parse("appbase = http://example.com/app\nversion = 4\n");
        assert_eq!(cfg.get("appbase"), Some("http://example.com/app"));
        assert_eq!(cfg.get("version"), Some("4"));
        assert_eq!(cfg.get("class"), None);
    }

    #[test]
    fn test_repeated_keys_keep_file_order() {
        let cfg = ConfigMap::parse("code = a.jar\ncode = b.jar\nresource = x.png\ncode = c.jar\n");
        assert_eq!(cfg.get_multi("code"), vec!["a.jar", "b.jar", "c.jar"]);
        assert_eq!(cfg.get_multi("resource"), vec!["x.png"]);
        assert_eq!(cfg.get("code"), Some("a.jar"));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let cfg = ConfigMap::parse("# header\n\nclass = app.Main\n  # indented comment\n");
        assert_eq!(cfg.get("class"), Some("app.Main"));
        assert!(cfg.get_multi("#").is_empty());
    }

    #[test]
    fn test_whitespace_trimmed() {
        let cfg = ConfigMap::parse("  class   =   app.Main  \n");
        assert_eq!(cfg.get("class"), Some("app.Main"));
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let cfg = ConfigMap::parse("not a pair\n= dangling value\nclass = app.Main\n");
        assert_eq!(cfg.get("class"), Some("app.Main"));
        assert_eq!(cfg.get("not a pair"), None);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let cfg = ConfigMap::parse("apparg = --mode=fast\n");
        assert_eq!(cfg.get("apparg"), Some("--mode=fast"));
    }
}

//! INI file configuration adapter.

use crate::domain::error::KestrelError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KestrelError> {
        let mut config = Ini::new();
        config
            .load(path.as_ref())
            .map_err(|e| KestrelError::ConfigParse {
                file: path.as_ref().display().to_string(),
                reason: e,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, KestrelError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|e| KestrelError::ConfigParse {
                file: "<inline>".into(),
                reason: e,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[sqlite]
path = /var/lib/kestrel/ledger.db

[strategy]
policy = triple_filter
rsi_threshold = 35

[risk]
stop_loss_pct = 0.01
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/kestrel/ledger.db".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "policy"),
            Some("triple_filter".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[strategy]\npolicy = rsi_oversold\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[runner]\ninterval_secs = 60\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("runner", "interval_secs", 0), 60);
        assert_eq!(adapter.get_int("runner", "missing", 42), 42);
        assert_eq!(adapter.get_int("runner", "bad", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[risk]\ntake_profit_pct = 0.015\nbad = x\n").unwrap();
        assert_eq!(adapter.get_double("risk", "take_profit_pct", 0.0), 0.015);
        assert_eq!(adapter.get_double("risk", "missing", 9.9), 9.9);
        assert_eq!(adapter.get_double("risk", "bad", 9.9), 9.9);
    }

    #[test]
    fn get_bool_recognized_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[runner]\na = true\nb = yes\nc = 1\nd = no\n").unwrap();
        assert!(adapter.get_bool("runner", "a", false));
        assert!(adapter.get_bool("runner", "b", false));
        assert!(adapter.get_bool("runner", "c", false));
        assert!(!adapter.get_bool("runner", "d", true));
        assert!(adapter.get_bool("runner", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = kestrel.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("kestrel.db".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/kestrel.ini");
        assert!(matches!(result, Err(KestrelError::ConfigParse { .. })));
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "resloc.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResLocConfig {
    pub report: Option<ReportCfg>,
    pub swap: Option<SwapCfg>,
    pub log: Option<LogCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportCfg {
    /// Report file extension, without the dot.
    pub extension: Option<String>,
    /// Where translatable text lives, e.g. `//Textbox/Value`.
    pub selector: Option<String>,
    /// Prepended to the file name of every reinjected report.
    pub output_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwapCfg {
    pub extension: Option<String>,
    /// Disposed import files land here; relative paths resolve against the swapped directory.
    pub trash_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogCfg {
    pub dir: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Search order: explicit file, CWD/resloc.toml, $CONFIG_DIR/resloc/resloc.toml.
/// Earlier sources win field by field. An explicit file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<ResLocConfig, ConfigError> {
    let mut merged = ResLocConfig::default();
    if let Some(path) = explicit {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        merged = merge(merged, parse(&s, path)?);
    }
    if let Ok(p) = std::env::current_dir() {
        if let Some(cfg) = read_optional(&p.join(CONFIG_FILE))? {
            merged = merge(merged, cfg);
        }
    }
    if let Some(base) = dirs::config_dir() {
        if let Some(cfg) = read_optional(&base.join("resloc").join(CONFIG_FILE))? {
            merged = merge(merged, cfg);
        }
    }
    Ok(merged)
}

fn read_optional(path: &Path) -> Result<Option<ResLocConfig>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(s) => parse(&s, path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse(s: &str, path: &Path) -> Result<ResLocConfig, ConfigError> {
    toml::from_str::<ResLocConfig>(s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(mut a: ResLocConfig, b: ResLocConfig) -> ResLocConfig {
    a.report = merge_opt(a.report, b.report, merge_report);
    a.swap = merge_opt(a.swap, b.swap, merge_swap);
    a.log = merge_opt(a.log, b.log, merge_log);
    a
}

fn merge_opt<T: Default>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_report(mut a: ReportCfg, b: ReportCfg) -> ReportCfg {
    if a.extension.is_none() {
        a.extension = b.extension;
    }
    if a.selector.is_none() {
        a.selector = b.selector;
    }
    if a.output_prefix.is_none() {
        a.output_prefix = b.output_prefix;
    }
    a
}

fn merge_swap(mut a: SwapCfg, b: SwapCfg) -> SwapCfg {
    if a.extension.is_none() {
        a.extension = b.extension;
    }
    if a.trash_dir.is_none() {
        a.trash_dir = b.trash_dir;
    }
    a
}

fn merge_log(mut a: LogCfg, b: LogCfg) -> LogCfg {
    if a.dir.is_none() {
        a.dir = b.dir;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_source_wins_per_field() {
        let a: ResLocConfig = toml::from_str(
            r#"
            [report]
            output_prefix = "FR_"
            "#,
        )
        .unwrap();
        let b: ResLocConfig = toml::from_str(
            r#"
            [report]
            output_prefix = "T_"
            extension = "rdl"
            [swap]
            trash_dir = "bin"
            "#,
        )
        .unwrap();
        let m = merge(a, b);
        let report = m.report.unwrap();
        assert_eq!(report.output_prefix.as_deref(), Some("FR_"));
        assert_eq!(report.extension.as_deref(), Some("rdl"));
        assert_eq!(m.swap.unwrap().trash_dir.as_deref(), Some("bin"));
    }

    #[test]
    fn explicit_file_is_loaded_and_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[swap]\nextension = \"resw\"\n").unwrap();
        let cfg = load_config(Some(&good)).unwrap();
        assert_eq!(cfg.swap.unwrap().extension.as_deref(), Some("resw"));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[swap]\nunknown = 1\n").unwrap();
        assert!(matches!(
            load_config(Some(&bad)),
            Err(ConfigError::Parse { .. })
        ));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}

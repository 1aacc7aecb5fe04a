//! Linker configuration loading from TOML.

use anyhow::{ensure, Context, Result};
use modlink_core::LinkerConfig;
use std::path::Path;

/// Picked up from the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "modlink.toml";

pub(crate) fn load(explicit: Option<&Path>) -> Result<LinkerConfig> {
    match explicit {
        Some(path) => read(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read(default)
            } else {
                Ok(LinkerConfig::default())
            }
        }
    }
}

fn read(path: &Path) -> Result<LinkerConfig> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("error reading config '{}'", path.display()))?;
    let config =
        parse(&src).with_context(|| format!("error parsing config '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded linker config");
    Ok(config)
}

pub(crate) fn parse(src: &str) -> Result<LinkerConfig> {
    let config: LinkerConfig = toml::from_str(src)?;
    ensure!(!config.separator.is_empty(), "separator must not be empty");
    ensure!(
        !config.wildcard_scope.is_empty(),
        "wildcard_scope must not be empty"
    );
    ensure!(
        config.secret_env_prefix != config.plain_env_prefix,
        "secret_env_prefix and plain_env_prefix must differ"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse("preserve_prefix = \"~\"\nintrinsic_prefixes = [\"AWS::\", \"Custom::\"]").unwrap();
        assert_eq!(config.preserve_prefix, "~");
        assert!(config.is_intrinsic("Custom::Thing"));
        assert_eq!(config.wildcard_scope, "all");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("wildcard = \"*\"").is_err());
    }

    #[test]
    fn empty_separator_is_rejected() {
        let err = parse("separator = \"\"").unwrap_err();
        assert!(err.to_string().contains("separator"));
    }

    #[test]
    fn explicit_path_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "secret_type = \"Password\"").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.secret_type, "Password");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/modlink.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("error reading config"));
    }
}

//! # Configuration file loading.
//!
//! Without an explicit path the file is `<executable name>.config.json` in the
//! current directory, where the executable name is its file name up to the
//! first `.` (`feeder.exe` → `feeder.config.json`).

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::modules::ModulesConfig;

/// Default config path for the running executable.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("can't get config file name")?;
    let cwd = std::env::current_dir().context("can't get current directory")?;
    Ok(config_path_for(&exe, &cwd))
}

fn config_path_for(exe: &Path, dir: &Path) -> PathBuf {
    let name = exe
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default();
    dir.join(format!("{name}.config.json"))
}

/// Reads the whole config file into a string.
pub fn load_config_file(path: Option<&Path>) -> anyhow::Result<String> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    std::fs::read_to_string(&path)
        .with_context(|| format!("can't open config file: {}", path.display()))
}

/// Reads and decodes a modules configuration file.
pub fn load_modules_config(path: Option<&Path>) -> anyhow::Result<ModulesConfig> {
    let text = load_config_file(path)?;
    Ok(ModulesConfig::parse(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_name_stops_at_first_dot() {
        let path = config_path_for(Path::new("/opt/bin/feeder.v2.exe"), Path::new("/srv"));
        assert_eq!(path, Path::new("/srv/feeder.config.json"));
    }

    #[test]
    fn reads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"modules":[{{"id":"a","type":"t"}}]}}"#).unwrap();

        let cfg = load_modules_config(Some(file.path())).unwrap();
        assert_eq!(cfg.modules[0].id, "a");
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.config.json");
        let err = load_config_file(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("absent.config.json"));
    }
}

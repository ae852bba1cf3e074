use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

const RC_ENV_VAR: &str = "DAYPLANRC";
const RC_FILE_NAME: &str = ".dayplanrc";

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        cfg.map
            .insert("data.location".to_string(), "~/.dayplan".to_string());
        cfg.map
            .insert("default.command".to_string(), "list".to_string());
        cfg.map.insert("color".to_string(), "on".to_string());
        cfg.map
            .insert("confirmation".to_string(), "on".to_string());

        if let Some(path) = resolve_rc_path(rc_override)? {
            info!(rc = %path.display(), "loading dayplanrc");
            cfg.load_file(&path)?;
        } else {
            debug!("no dayplanrc found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());
        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var(RC_ENV_VAR) {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(RC_FILE_NAME);
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".dayplan"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(&PathBuf::from(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::Config;

    #[test]
    fn overrides_shadow_file_values_and_defaults() {
        let mut cfg = Config {
            map: std::collections::HashMap::new(),
            loaded_files: vec![],
        };
        cfg.map.insert("color".to_string(), "on".to_string());

        cfg.apply_overrides(vec![
            ("rc.color".to_string(), "off".to_string()),
            ("confirmation".to_string(), "off".to_string()),
        ]);

        assert_eq!(cfg.get("color").as_deref(), Some("off"));
        assert_eq!(cfg.get_bool("confirmation"), Some(false));
    }

    #[test]
    fn rc_file_parses_comments_and_includes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extra = dir.path().join("extra.rc");
        let mut file = std::fs::File::create(&extra).expect("create extra rc");
        writeln!(file, "confirmation = off").expect("write");

        let rc = dir.path().join("dayplanrc");
        let mut file = std::fs::File::create(&rc).expect("create rc");
        writeln!(file, "# a comment").expect("write");
        writeln!(file, "color = off  # trailing comment").expect("write");
        writeln!(file, "include extra.rc").expect("write");

        let cfg = Config::load(Some(&rc)).expect("load config");
        assert_eq!(cfg.get("color").as_deref(), Some("off"));
        assert_eq!(cfg.get_bool("confirmation"), Some(false));
        assert_eq!(cfg.loaded_files.len(), 2);

        // untouched defaults survive
        assert_eq!(cfg.get("default.command").as_deref(), Some("list"));
    }
}

// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::OperatorConfig;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/portal/config.yaml"));

    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("portal/config.yaml"));
    }

    paths.push(PathBuf::from(".portal.yaml"));
    paths.push(PathBuf::from("portal.yaml"));

    paths
}

/// Load configuration by merging discovered YAML layers, an optional
/// explicit `--config` path, and finally a handful of well-known
/// `PORTAL_*` environment variables (database connection string,
/// encryption key material and current key id, scheduler poll interval).
pub fn load(extra: Option<&Path>) -> anyhow::Result<OperatorConfig> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_file(&mut merged, &path)?;
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_file(&mut merged, p)?;
    }

    let mut config: OperatorConfig = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        OperatorConfig::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn merge_file(dst: &mut serde_yaml::Value, path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let layer: serde_yaml::Value =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    merge_yaml(dst, layer);
    Ok(())
}

/// Deep-merge `src` into `dst`; `src` wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

fn apply_env_overrides(config: &mut OperatorConfig) {
    if let Ok(url) = std::env::var("PORTAL_DATABASE_URL") {
        config.database_url = url;
    }
    if let Ok(key_id) = std::env::var("PORTAL_ENCRYPTION_KEY_ID") {
        config.encryption.current_key_id = Some(key_id);
    }
    // PORTAL_ENCRYPTION_KEYS is "id1=base64key1,id2=base64key2"
    if let Ok(raw) = std::env::var("PORTAL_ENCRYPTION_KEYS") {
        for pair in raw.split(',').filter(|s| !s.is_empty()) {
            if let Some((id, key)) = pair.split_once('=') {
                config
                    .encryption
                    .keys
                    .insert(id.to_string(), key.to_string());
            }
        }
    }
    if let Ok(secs) = std::env::var("PORTAL_SCHEDULER_POLL_INTERVAL_SECS") {
        if let Ok(parsed) = secs.parse() {
            config.scheduler_poll_interval_secs = parsed;
        }
    }
    if !config.encryption.keys.is_empty() && config.encryption.current_key_id.is_none() {
        tracing::warn!("encryption keys configured but no current_key_id set — falling back to plaintext mode");
    }
    if config.encryption.current_key_id.is_none() {
        tracing::warn!("no encryption key configured — credential vault is running in plaintext mode");
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        let src = val("b: 99");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/portal_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.scheduler_poll_interval_secs, 60);
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "scheduler_poll_interval_secs: 30\ndatabase_url: postgres://x").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.scheduler_poll_interval_secs, 30);
        assert_eq!(cfg.database_url, "postgres://x");
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::schema::Options;

/// Ordered list of candidate config-document locations, lowest precedence
/// first: system-wide, then XDG config dir, then `$HOME/.config`, then
/// workspace-local (§6, "Configuration document"). Only existing files are
/// returned by [`load`]; this function itself returns candidates regardless
/// of existence so callers can log what was searched.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    for ext in ["yaml", "yml", "json"] {
        paths.push(PathBuf::from(format!("/etc/kubectl-ai/config.{ext}")));
    }

    // 2. XDG / home
    if let Some(config_dir) = dirs::config_dir() {
        for ext in ["yaml", "yml", "json"] {
            paths.push(config_dir.join("kubectl-ai").join(format!("config.{ext}")));
        }
    }
    if let Some(home) = dirs::home_dir() {
        for ext in ["yaml", "yml", "json"] {
            paths.push(
                home.join(".config")
                    .join("kubectl-ai")
                    .join(format!("config.{ext}")),
            );
        }
    }

    // 3. Workspace-local
    for ext in ["yaml", "yml"] {
        paths.push(PathBuf::from(format!(".kubectl-ai/config.{ext}")));
        paths.push(PathBuf::from(format!(".kubectl-ai.{ext}")));
    }

    paths
}

/// Load and layer-merge every existing config document in
/// [`config_search_paths`], then an optional explicit override path, later
/// documents winning field-by-field (deep merge on YAML mappings).
pub fn load(explicit: Option<&Path>) -> Result<Options, ConfigError> {
    let mut merged = Value::Mapping(Default::default());

    for path in config_search_paths() {
        if path.exists() {
            debug!(path = %path.display(), "loading layered config document");
            merge_in(&mut merged, &path)?;
        }
    }
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading explicit config document");
        merge_in(&mut merged, path)?;
    }

    serde_yaml::from_value(merged).map_err(|source| ConfigError::Parse {
        path: explicit.map(Path::to_path_buf).unwrap_or_default(),
        source,
    })
}

fn merge_in(base: &mut Value, path: &Path) -> Result<(), ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let layer: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    deep_merge(base, layer);
    Ok(())
}

/// Merge `overlay` into `base` in place; overlay wins on scalar conflicts,
/// mappings are merged key-by-key, everything else (sequences, scalars) is
/// replaced wholesale by the overlay's value.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn search_paths_are_layered_system_xdg_home_then_workspace() {
        let paths = config_search_paths();
        let system = paths.iter().position(|p| p.starts_with("/etc/kubectl-ai")).unwrap();
        let xdg_or_home = paths
            .iter()
            .position(|p| p.to_string_lossy().contains("kubectl-ai") && !p.starts_with("/etc"))
            .unwrap();
        let workspace = paths
            .iter()
            .position(|p| p.starts_with(".kubectl-ai"))
            .unwrap();
        assert!(system < xdg_or_home, "system tier must precede XDG/home tiers");
        assert!(xdg_or_home < workspace, "XDG/home tiers must precede the workspace-local tier");
    }

    #[test]
    fn later_layer_wins_on_conflict() {
        let mut base = serde_yaml::from_str::<Value>("model: a\nmax-iterations: 1\n").unwrap();
        let overlay = serde_yaml::from_str::<Value>("model: b\n").unwrap();
        deep_merge(&mut base, overlay);
        let opts: Options = serde_yaml::from_value(base).unwrap();
        assert_eq!(opts.model.as_deref(), Some("b"));
        assert_eq!(opts.max_iterations, Some(1));
    }

    #[test]
    fn load_explicit_path_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(&dir, "config.yaml", "llm-provider: openai\n");
        let opts = load(Some(&path)).unwrap();
        assert_eq!(opts.llm_provider.as_deref(), Some("openai"));
    }

    #[test]
    fn load_missing_explicit_path_errors() {
        let err = load(Some(Path::new("/no/such/kubectl-ai-config.yaml")));
        assert!(err.is_err());
    }

    #[test]
    fn nested_mapping_merges_key_by_key() {
        let mut base =
            serde_yaml::from_str::<Value>("tool-config-paths: [/a]\nmodel: x\n").unwrap();
        let overlay = serde_yaml::from_str::<Value>("model: y\n").unwrap();
        deep_merge(&mut base, overlay);
        let opts: Options = serde_yaml::from_value(base).unwrap();
        assert_eq!(opts.model.as_deref(), Some("y"));
        assert_eq!(
            opts.tool_config_paths,
            Some(vec![PathBuf::from("/a")])
        );
    }
}

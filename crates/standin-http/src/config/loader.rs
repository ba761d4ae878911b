//! YAML declaration loading.
//!
//! Walks a config directory recursively for `*.yaml` / `*.yml` files and
//! collects the `routes` list from each. A single unparseable file or route
//! is skipped with a diagnostic, never fatal; the registry decides whether
//! the surviving set is usable.

use super::route::RouteDeclaration;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct DeclarationFile {
    #[serde(default)]
    routes: Vec<RouteDeclaration>,
}

/// Load raw route declarations from every YAML file under `dir`, in sorted
/// path order so the last-writer-wins merge is deterministic.
pub fn load_declarations<P: AsRef<Path>>(dir: P) -> Result<Vec<RouteDeclaration>, anyhow::Error> {
    let dir = dir.as_ref();
    if !dir.exists() {
        anyhow::bail!("config directory not found: {}", dir.display());
    }

    let mut files = Vec::new();
    collect_yaml_files(dir, &mut files)?;
    files.sort();

    let mut declarations = Vec::new();
    for path in files {
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("skipping unreadable config file {}: {e}", path.display());
                continue;
            }
        };
        let parsed: DeclarationFile = match serde_yaml::from_str(&contents) {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping invalid config file {}: {e}", path.display());
                continue;
            }
        };
        if parsed.routes.is_empty() {
            warn!("config file {} declares no routes", path.display());
            continue;
        }
        info!(
            "loaded {} route declaration(s) from {}",
            parsed.routes.len(),
            path.display()
        );
        declarations.extend(parsed.routes);
    }

    Ok(declarations)
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_from_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.yaml"),
            "routes:\n  - path: /a\n    methods:\n      - method: GET\n        response: {ok: true}\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(
            dir.path().join("sub/b.yml"),
            "routes:\n  - path: /b\n    methods:\n      - method: POST\n        response: {ok: true}\n",
        )
        .unwrap();

        let declarations = load_declarations(dir.path()).unwrap();
        assert_eq!(declarations.len(), 2);
        let paths: Vec<_> = declarations.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"/a"));
        assert!(paths.contains(&"/b"));
    }

    #[test]
    fn test_invalid_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.yaml"), ":: not yaml at all {{{").unwrap();
        fs::write(
            dir.path().join("good.yaml"),
            "routes:\n  - path: /ok\n    methods:\n      - method: GET\n",
        )
        .unwrap();

        let declarations = load_declarations(dir.path()).unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].path, "/ok");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(load_declarations("/nonexistent/standin/config").is_err());
    }

    #[test]
    fn test_file_without_routes_section_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.yaml"), "settings:\n  port: 1\n").unwrap();
        let declarations = load_declarations(dir.path()).unwrap();
        assert!(declarations.is_empty());
    }
}

//! Lecteur de ressources Servo.
//!
//! Servo a besoin d'un ensemble de fichiers de ressources (préférences,
//! certificats, domaines publics, etc.). L'embedder fournit une
//! implémentation de `ResourceReaderMethods` et l'enregistre via
//! `servo::resources::set()`.
//!
//! Le dossier `resources/` est cherché, dans l'ordre :
//! 1. Variable d'environnement `SERVO_RESOURCES_PATH`
//! 2. À côté de l'exécutable (`<exe_dir>/resources/`), ou à la racine du
//!    projet quand l'exécutable est dans `target/{debug,release}/`
//! 3. Dans le répertoire courant (`./resources/`)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

use servo::resources::{self, Resource};
use thiserror::Error;
use tracing::{error, info};

static RESOURCES_DIR: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(
        "Servo 'resources/' directory not found; set SERVO_RESOURCES_PATH or place it next to the executable"
    )]
    NotFound,
}

/// Résout le dossier de ressources et enregistre le lecteur.
///
/// **Doit être appelé avant `ServoBuilder::build()`.**
pub fn init() -> Result<(), ResourceError> {
    let dir = find_resources_dir().ok_or(ResourceError::NotFound)?;
    info!(dir = %dir.display(), "Servo resources");
    let _ = RESOURCES_DIR.set(dir);
    resources::set(Box::new(ResourceReader));
    Ok(())
}

struct ResourceReader;

impl resources::ResourceReaderMethods for ResourceReader {
    fn read(&self, file: Resource) -> Vec<u8> {
        let Some(dir) = RESOURCES_DIR.get() else {
            error!(file = file.filename(), "Resource reader used before init");
            return Vec::new();
        };
        let Some(path) = resolve_within(dir, file.filename()) else {
            error!(file = file.filename(), "Resource path escapes the resources directory");
            return Vec::new();
        };
        fs::read(&path).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "Cannot read Servo resource");
            Vec::new()
        })
    }

    fn sandbox_access_files_dirs(&self) -> Vec<PathBuf> {
        RESOURCES_DIR.get().cloned().into_iter().collect()
    }

    fn sandbox_access_files(&self) -> Vec<PathBuf> {
        vec![]
    }
}

/// Chemin canonique de `name` dans `dir`, ou `None` s'il n'existe pas ou
/// sort de `dir` (`../`, lien symbolique).
fn resolve_within(dir: &Path, name: &str) -> Option<PathBuf> {
    let base = dir.canonicalize().ok()?;
    let path = base.join(name).canonicalize().ok()?;
    path.starts_with(&base).then_some(path)
}

fn find_resources_dir() -> Option<PathBuf> {
    if let Ok(path) = env::var("SERVO_RESOURCES_PATH") {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Some(path);
        }
    }

    if let Ok(exe_path) = env::current_exe()
        && let Ok(canonical) = exe_path.canonicalize()
        && let Some(exe_dir) = canonical.parent()
    {
        let path = exe_dir.join("resources");
        if path.is_dir() {
            return Some(path);
        }

        // Pendant le développement : target/{debug,release}/ → racine.
        if let Some(target_dir) = exe_dir.parent()
            && target_dir.file_name().is_some_and(|n| n == "target")
            && let Some(project_root) = target_dir.parent()
        {
            let path = project_root.join("resources");
            if path.is_dir() {
                return Some(path);
            }
        }
    }

    let path = env::current_dir().ok()?.join("resources");
    path.is_dir().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_within_accepts_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prefs.json"), "{}").unwrap();

        let resolved = resolve_within(dir.path(), "prefs.json").unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(fs::read_to_string(resolved).unwrap(), "{}");
    }

    #[test]
    fn test_resolve_within_rejects_traversal() {
        let root = tempfile::tempdir().unwrap();
        let resources = root.path().join("resources");
        fs::create_dir(&resources).unwrap();
        fs::write(root.path().join("secret.txt"), "x").unwrap();

        assert_eq!(resolve_within(&resources, "../secret.txt"), None);
    }

    #[test]
    fn test_resolve_within_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_within(dir.path(), "absent.json"), None);
    }
}

//! Intégration minimale avec le bureau : dossier personnel et ouverture
//! d'un chemin avec l'application par défaut.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

/// Dossier personnel de l'utilisateur.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Programme d'ouverture par défaut de la plateforme.
pub fn opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Ouvre `path` sans attendre la fin du programme lancé.
pub fn open_path(path: &Path) -> io::Result<()> {
    debug!(path = %path.display(), opener = opener(), "Opening path externally");
    Command::new(opener())
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

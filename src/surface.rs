//! Identité, rôle et configuration de création des surfaces.
//!
//! Une surface est une fenêtre de contenu sans chrome natif. Trois rôles :
//!
//! | Rôle    | Taille     | Particularités                                   |
//! |---------|------------|--------------------------------------------------|
//! | Main    | 1680 × 864 | plein écran / épinglée selon la configuration    |
//! | Child   | 1280 × 720 | ouverte par `window.open` / `target="_blank"`    |
//! | Overlay | 200 × 60   | transparente, toujours au-dessus, hors barre des tâches |

use std::fmt;

use crate::config::{HiddenFeatures, Settings};

/// Identifiant opaque attribué par l'hôte à la création.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Main,
    Child,
    Overlay,
}

impl SurfaceRole {
    pub fn is_child(self) -> bool {
        self == Self::Child
    }
}

impl fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Main => "main",
            Self::Child => "child",
            Self::Overlay => "overlay",
        })
    }
}

/// Paramètres de création transmis à l'hôte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub role: SurfaceRole,
    pub title: &'static str,
    pub width: u32,
    pub height: u32,
    pub frameless: bool,
    pub fullscreen: bool,
    pub always_on_top: bool,
    pub transparent: bool,
    pub skip_taskbar: bool,
    pub resizable: bool,
}

impl SurfaceSpec {
    pub const TITLE: &'static str = "KioskShell";

    pub fn main(settings: &Settings) -> Self {
        Self {
            role: SurfaceRole::Main,
            title: Self::TITLE,
            width: 1680,
            height: 864,
            frameless: true,
            fullscreen: settings.fullscreen,
            always_on_top: settings.pinned,
            transparent: false,
            skip_taskbar: false,
            resizable: true,
        }
    }

    pub fn child() -> Self {
        Self {
            role: SurfaceRole::Child,
            title: Self::TITLE,
            width: 1280,
            height: 720,
            frameless: true,
            fullscreen: false,
            always_on_top: false,
            transparent: false,
            skip_taskbar: false,
            resizable: true,
        }
    }

    pub fn overlay() -> Self {
        Self {
            role: SurfaceRole::Overlay,
            title: "Controls",
            width: 200,
            height: 60,
            frameless: true,
            fullscreen: false,
            always_on_top: true,
            transparent: true,
            skip_taskbar: true,
            resizable: false,
        }
    }
}

/// Position et taille extérieures d'une surface, en pixels logiques.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Coin supérieur gauche d'un rectangle `width × height` centré dans `self`.
    pub fn centered(&self, width: u32, height: u32) -> (i32, i32) {
        let dx = (i64::from(self.width) - i64::from(width)) / 2;
        let dy = (i64::from(self.height) - i64::from(height)) / 2;
        (self.x + dx as i32, self.y + dy as i32)
    }
}

/// État suivi par le gestionnaire pour chaque surface vivante.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRecord {
    pub role: SurfaceRole,
    pub destroyed: bool,
    /// Fonctionnalités masquées, figées à la création (vide pour l'Overlay).
    pub hidden: HiddenFeatures,
}

impl SurfaceRecord {
    pub fn new(role: SurfaceRole, hidden: HiddenFeatures) -> Self {
        let hidden = match role {
            SurfaceRole::Overlay => HiddenFeatures::default(),
            SurfaceRole::Main | SurfaceRole::Child => hidden,
        };
        Self {
            role,
            destroyed: false,
            hidden,
        }
    }
}

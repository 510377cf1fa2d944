//! Frontière entre le shell et la boîte à outils fenêtrée.
//!
//! Le shell ne connaît l'hôte qu'à travers [`SurfaceHost`]. Dans l'autre
//! sens, l'hôte remonte tout ce qui se passe sous forme de [`HostEvent`],
//! traités un par un sur la boucle d'événements ; la réponse
//! ([`EventResponse`]) dit à l'hôte s'il doit laisser passer, avaler ou
//! répondre.
//!
//! Les appels longs (script, nettoyage du stockage) ne bloquent jamais : ils
//! emportent un ticket [`Completion`] que l'hôte rend plus tard dans
//! [`HostEvent::ScriptCompleted`] ou [`HostEvent::StorageCleared`].

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::input::KeyInput;
use crate::styles::StyleKey;
use crate::surface::{Bounds, SurfaceId, SurfaceRole, SurfaceSpec};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0} is gone")]
    SurfaceGone(SurfaceId),
    #[error("cannot create {role} surface: {reason}")]
    Creation { role: SurfaceRole, reason: String },
    #[error("invalid address `{0}`")]
    InvalidUrl(String),
    #[error("script failed in {surface}: {reason}")]
    Script { surface: SurfaceId, reason: String },
    #[error("no storage to clear in the opaque origin of {0}")]
    StorageUnavailable(SurfaceId),
    #[error("cannot open {path}: {source}")]
    OpenExternal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ticket d'une opération asynchrone en cours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Completion(pub u64);

/// Capacités minimales attendues de la boîte à outils.
///
/// Toute méthode visant une surface détruite renvoie
/// [`HostError::SurfaceGone`] ; elle ne panique jamais.
pub trait SurfaceHost {
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError>;
    fn is_alive(&self, surface: SurfaceId) -> bool;

    fn load_url(&mut self, surface: SurfaceId, url: &str) -> Result<(), HostError>;

    /// Exécute `script`. Avec un ticket, le résultat revient plus tard dans
    /// [`HostEvent::ScriptCompleted`].
    fn execute_script(
        &mut self,
        surface: SurfaceId,
        script: &str,
        completion: Option<Completion>,
    ) -> Result<(), HostError>;

    /// Insère `css` sous la clé `key`. Une insertion sous une clé déjà
    /// présente remplace la précédente.
    fn insert_css(&mut self, surface: SurfaceId, key: StyleKey, css: &str)
    -> Result<(), HostError>;

    fn minimize(&mut self, surface: SurfaceId) -> Result<(), HostError>;
    fn is_maximized(&self, surface: SurfaceId) -> Result<bool, HostError>;
    fn set_maximized(&mut self, surface: SurfaceId, maximized: bool) -> Result<(), HostError>;
    fn is_fullscreen(&self, surface: SurfaceId) -> Result<bool, HostError>;
    fn set_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool) -> Result<(), HostError>;

    /// Ferme la surface ; l'hôte émettra ensuite [`HostEvent::Closed`].
    fn close(&mut self, surface: SurfaceId) -> Result<(), HostError>;

    fn show(&mut self, surface: SurfaceId) -> Result<(), HostError>;
    fn hide(&mut self, surface: SurfaceId) -> Result<(), HostError>;
    fn bounds(&self, surface: SurfaceId) -> Result<Bounds, HostError>;
    fn set_position(&mut self, surface: SurfaceId, x: i32, y: i32) -> Result<(), HostError>;

    /// Vide cache et stockage de la session de `surface`. Termine par
    /// [`HostEvent::StorageCleared`].
    fn clear_storage(&mut self, surface: SurfaceId, completion: Completion)
    -> Result<(), HostError>;

    /// Ouvre un chemin local avec l'application par défaut du système.
    fn open_external(&mut self, path: &Path) -> Result<(), HostError>;

    /// Demande la sortie de la boucle d'événements.
    fn request_exit(&mut self);
}

/// Ce que l'hôte remonte au shell.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// La boîte à outils est prête à créer des fenêtres.
    AppReady,
    /// L'application est réactivée (clic dans le dock…).
    Activate,
    AllWindowsClosed,

    NavigationStarted(SurfaceId),
    /// Le DOM du document courant est construit.
    DocumentReady(SurfaceId),
    LoadFinished(SurfaceId),
    /// Navigation dans la même page (ancre, `history.pushState`).
    InPageNavigation(SurfaceId),
    NavigationFailed {
        surface: SurfaceId,
        code: i32,
        description: String,
        url: String,
    },
    ContextMenuRequested(SurfaceId),
    BeforeInput {
        surface: SurfaceId,
        input: KeyInput,
    },
    /// Appel du contenu sur un canal du pont.
    Message {
        surface: SurfaceId,
        channel: String,
        data: Option<Value>,
    },
    ScriptCompleted {
        surface: SurfaceId,
        completion: Completion,
        result: Result<Value, String>,
    },
    StorageCleared {
        surface: SurfaceId,
        completion: Completion,
    },
    FocusLost(SurfaceId),
    Closed(SurfaceId),
}

/// Réponse du shell à un événement.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResponse {
    /// Comportement par défaut de l'hôte.
    Continue,
    /// Comportement par défaut annulé.
    Suppress,
    /// Corps JSON à renvoyer à l'appelant d'un canal.
    Reply(Value),
}

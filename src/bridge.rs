//! Protocole de commande entre le contenu (non privilégié) et l'hôte.
//!
//! Trois couches :
//!
//! 1. **Enveloppes de page** ([`Envelope`]) : messages `window.postMessage`
//!    `{type: "control-request" | "control-relay", action, data?}`. Le panneau
//!    injecté poste des `control-relay`, relayées en `control-request`.
//! 2. **Pont** ([`bridge_script`]) : script installé au démarrage de chaque
//!    document. Il expose `window.kioskAPI` et transmet les `control-request`
//!    telles quelles sur le canal [`CONTROL_CHANNEL`], où l'hôte les décode.
//! 3. **Canaux hôte** : chaque appel devient une requête vers le domaine
//!    réservé [`BRIDGE_ORIGIN`], interceptée par l'hôte, décodée en
//!    [`RemoteCommand`] par [`parse_inbound`] et répondue en JSON
//!    ([`CommandReply`]).
//!
//! Dans l'autre sens, l'hôte notifie la page via [`notification_script`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::FileConfig;

/// Domaine réservé intercepté par l'hôte (jamais résolu sur le réseau).
pub const BRIDGE_ORIGIN: &str = "http://kioskshell.bridge";

pub const CONTROL_REQUEST: &str = "control-request";
pub const CONTROL_RELAY: &str = "control-relay";

/// Canal des enveloppes de page transmises par le pont.
pub const CONTROL_CHANNEL: &str = "control-envelope";

/// Canal de la couche navigation : ouverture d'une nouvelle cible.
pub const OPEN_WINDOW_CHANNEL: &str = "open-window";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),
    #[error("channel `{channel}` expects {expected}")]
    BadPayload {
        channel: &'static str,
        expected: &'static str,
    },
    #[error("envelope `{0}` is not a control request")]
    NotARequest(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Commandes
// ─────────────────────────────────────────────────────────────────────────────

/// Requête du contenu vers l'hôte. Ensemble fermé : ajouter une commande
/// oblige à compléter chaque `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    DragStart,
    ShowControls,
    Navigate(String),
    ReturnToLogin,
    Minimize,
    Maximize,
    Close,
    ToggleFullscreen,
    GetConfig,
    GetBackgroundPath,
    ClearCache,
    ContentReady,
}

impl RemoteCommand {
    /// Nom du canal porteur.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::DragStart => "drag-start",
            Self::ShowControls => "show-controls",
            Self::Navigate(_) => "navigate-to-url",
            Self::ReturnToLogin => "return-to-login",
            Self::Minimize => "minimize-window",
            Self::Maximize => "maximize-window",
            Self::Close => "close-window",
            Self::ToggleFullscreen => "toggle-fullscreen",
            Self::GetConfig => "get-app-config",
            Self::GetBackgroundPath => "get-background-path",
            Self::ClearCache => "clear-history-cache",
            Self::ContentReady => "content-ready",
        }
    }

    /// Notifications sans réponse attendue.
    pub fn is_one_way(&self) -> bool {
        matches!(self, Self::DragStart | Self::ShowControls)
    }
}

/// Message entrant décodé.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(RemoteCommand),
    /// Le contenu veut ouvrir une nouvelle cible de premier niveau
    /// (`window.open`, lien `target="_blank"`).
    OpenWindow(String),
}

/// Décode un appel `channel(data)`.
pub fn parse_inbound(channel: &str, data: Option<&Value>) -> Result<Inbound, BridgeError> {
    let command = match channel {
        "drag-start" => RemoteCommand::DragStart,
        "show-controls" => RemoteCommand::ShowControls,
        "navigate-to-url" => RemoteCommand::Navigate(string_payload(
            "navigate-to-url",
            data,
        )?),
        "return-to-login" => RemoteCommand::ReturnToLogin,
        "minimize-window" => RemoteCommand::Minimize,
        "maximize-window" => RemoteCommand::Maximize,
        "close-window" => RemoteCommand::Close,
        "toggle-fullscreen" => RemoteCommand::ToggleFullscreen,
        "get-app-config" => RemoteCommand::GetConfig,
        "get-background-path" => RemoteCommand::GetBackgroundPath,
        "clear-history-cache" => RemoteCommand::ClearCache,
        "content-ready" => RemoteCommand::ContentReady,
        CONTROL_CHANNEL => envelope_payload(data)?.relay().into_command()?,
        OPEN_WINDOW_CHANNEL => {
            return Ok(Inbound::OpenWindow(string_payload(
                OPEN_WINDOW_CHANNEL,
                data,
            )?));
        }
        other => return Err(BridgeError::UnknownChannel(other.to_string())),
    };
    Ok(Inbound::Command(command))
}

fn envelope_payload(data: Option<&Value>) -> Result<Envelope, BridgeError> {
    data.and_then(|value| Envelope::deserialize(value).ok())
        .ok_or(BridgeError::BadPayload {
            channel: CONTROL_CHANNEL,
            expected: "a control envelope",
        })
}

fn string_payload(channel: &'static str, data: Option<&Value>) -> Result<String, BridgeError> {
    match data {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(BridgeError::BadPayload {
            channel,
            expected: "a non-empty string",
        }),
    }
}

/// Réponse renvoyée au contenu. Ne transporte jamais d'erreur : un échec
/// est un `false` (ou `null`) que le contenu traite comme un no-op.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    /// Notification à sens unique, répondue par `null`.
    None,
    Flag(bool),
    Config(FileConfig),
    Path(Option<String>),
}

impl CommandReply {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Bool(false))
    }

    /// Vrai si la commande a abouti.
    pub fn succeeded(&self) -> bool {
        match self {
            Self::None | Self::Config(_) => true,
            Self::Flag(ok) => *ok,
            Self::Path(path) => path.is_some(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Enveloppes de page
// ─────────────────────────────────────────────────────────────────────────────

/// Actions postables par le panneau de contrôle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelAction {
    ReturnToLogin,
    Minimize,
    Maximize,
    Close,
    ToggleFullscreen,
}

impl PanelAction {
    pub const ALL: [PanelAction; 5] = [
        Self::ReturnToLogin,
        Self::Minimize,
        Self::Maximize,
        Self::Close,
        Self::ToggleFullscreen,
    ];

    pub fn command(self) -> RemoteCommand {
        match self {
            Self::ReturnToLogin => RemoteCommand::ReturnToLogin,
            Self::Minimize => RemoteCommand::Minimize,
            Self::Maximize => RemoteCommand::Maximize,
            Self::Close => RemoteCommand::Close,
            Self::ToggleFullscreen => RemoteCommand::ToggleFullscreen,
        }
    }

    fn wire_name(self) -> &'static str {
        match self {
            Self::ReturnToLogin => "return-to-login",
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
            Self::Close => "close",
            Self::ToggleFullscreen => "toggle-fullscreen",
        }
    }
}

/// Message `window.postMessage` échangé à l'intérieur d'une page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    ControlRequest {
        action: PanelAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    ControlRelay {
        action: PanelAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl Envelope {
    /// Un relais reçu d'un cadre embarqué repart vers le pont en requête.
    pub fn relay(self) -> Envelope {
        match self {
            Self::ControlRelay { action, data } => Self::ControlRequest { action, data },
            request => request,
        }
    }

    /// Commande portée par une requête ; un relais doit d'abord être relayé.
    pub fn into_command(self) -> Result<RemoteCommand, BridgeError> {
        match self {
            Self::ControlRequest { action, .. } => Ok(action.command()),
            Self::ControlRelay { .. } => Err(BridgeError::NotARequest(CONTROL_RELAY)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport : URL du domaine réservé
// ─────────────────────────────────────────────────────────────────────────────

/// Vrai si l'URL vise le pont.
pub fn is_bridge_url(url: &Url) -> bool {
    url.host_str() == Some("kioskshell.bridge")
}

/// Extrait `(canal, données)` d'une URL d'appel. `None` si l'URL ne vise
/// pas le pont ; les données JSON illisibles sont ignorées.
pub fn parse_invoke_url(url: &Url) -> Option<(String, Option<Value>)> {
    if !is_bridge_url(url) {
        return None;
    }
    let channel = url.path().strip_prefix("/invoke/")?;
    if channel.is_empty() {
        return None;
    }
    let data = url
        .query_pairs()
        .find(|(key, _)| key == "data")
        .and_then(|(_, raw)| serde_json::from_str(&raw).ok());
    Some((channel.to_string(), data))
}

// ─────────────────────────────────────────────────────────────────────────────
// Hôte → contenu
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    WindowDragging,
    ConfigUpdated(FileConfig),
}

impl HostNotification {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::WindowDragging => "window-dragging",
            Self::ConfigUpdated(_) => "config-updated",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::WindowDragging => Value::Null,
            Self::ConfigUpdated(config) => serde_json::to_value(config).unwrap_or(Value::Null),
        }
    }
}

/// Script qui délivre une notification aux écouteurs installés par le pont.
pub fn notification_script(notification: &HostNotification) -> String {
    format!(
        "window.__kioskshell && window.__kioskshell.emit({}, {});",
        Value::String(notification.channel().to_string()),
        notification.payload()
    )
}

/// Script de pont, installé avant tout script de page.
pub fn bridge_script() -> String {
    let actions: serde_json::Map<String, Value> = PanelAction::ALL
        .into_iter()
        .map(|a| {
            (
                a.wire_name().to_string(),
                Value::String(a.command().channel().to_string()),
            )
        })
        .collect();

    BRIDGE_SCRIPT
        .replace("__ORIGIN__", BRIDGE_ORIGIN)
        .replace("__ACTIONS__", &Value::Object(actions).to_string())
        .replace("__REQUEST__", CONTROL_REQUEST)
        .replace("__CONTROL__", CONTROL_CHANNEL)
        .replace("__OPEN_WINDOW__", OPEN_WINDOW_CHANNEL)
}

const BRIDGE_SCRIPT: &str = r#"(function () {
  if (window.__kioskshell) { return; }

  const listeners = {};
  const actions = __ACTIONS__;
  let domReady = false;

  const invoke = (channel, data) => {
    let url = '__ORIGIN__/invoke/' + channel;
    if (data !== undefined) { url += '?data=' + encodeURIComponent(JSON.stringify(data)); }
    return fetch(url, { cache: 'no-store' })
      .then((response) => response.json())
      .catch(() => false);
  };
  const send = (channel) => { invoke(channel); };
  const on = (channel, fn) => { (listeners[channel] = listeners[channel] || []).push(fn); };

  window.__kioskshell = {
    emit(channel, payload) {
      (listeners[channel] || []).forEach((fn) => { try { fn(payload); } catch (e) {} });
    },
  };

  window.kioskAPI = {
    navigateToUrl: (url) => invoke('navigate-to-url', url),
    returnToLogin: () => invoke('return-to-login'),
    minimizeWindow: () => invoke('minimize-window'),
    maximizeWindow: () => invoke('maximize-window'),
    closeWindow: () => invoke('close-window'),
    toggleFullscreen: () => invoke('toggle-fullscreen'),
    startDrag: () => send('drag-start'),
    showControls: () => send('show-controls'),
    getAppConfig: () => invoke('get-app-config'),
    getBackgroundPath: () => invoke('get-background-path'),
    clearHistoryAndCache: () => invoke('clear-history-cache'),
    onConfigUpdated: (fn) => on('config-updated', fn),
    onWindowDragging: (fn) => on('window-dragging', fn),
  };

  window.addEventListener('message', (event) => {
    if (!domReady) { return; }
    const data = event.data;
    if (data && data.type === '__REQUEST__' && actions[data.action]) {
      invoke('__CONTROL__', { type: data.type, action: data.action });
    }
  });

  const openWindow = (target) => {
    try { invoke('__OPEN_WINDOW__', String(new URL(target, location.href))); } catch (e) {}
  };
  window.open = function (target) {
    if (target) { openWindow(target); }
    return null;
  };
  document.addEventListener('click', (e) => {
    const link = e.target && e.target.closest ? e.target.closest('a[target="_blank"]') : null;
    if (link && link.href) {
      e.preventDefault();
      openWindow(link.href);
    }
  }, true);

  window.addEventListener('DOMContentLoaded', () => {
    domReady = true;
    document.addEventListener('dblclick', (e) => {
      if (e.clientY < 30) { e.preventDefault(); e.stopPropagation(); }
    }, true);
    invoke('content-ready');
  });
})();
"#;

//! Génération du panneau de contrôle injecté dans les pages.
//!
//! [`build`] est une fonction pure : à partir de l'ensemble des
//! fonctionnalités masquées, elle produit le script et la feuille de style
//! que le contrôleur de surface injecte une fois le document prêt.
//!
//! ## Protocole côté page
//!
//! ```text
//! clic bouton ──► hideControlPanel() ──(50 ms)──► postMessage({type: "control-relay", action})
//!                                                        │
//!                     relais (même script) ◄─────────────┘
//!                                │
//!                                ▼
//!                 postMessage({type: "control-request", action}) ──► pont kioskAPI ──► hôte
//! ```

use serde::Serialize;

use crate::bridge::{CONTROL_RELAY, CONTROL_REQUEST};
use crate::config::HiddenFeatures;
use crate::styles;

/// Nom de la fonctionnalité qui supprime entièrement le panneau.
pub const HIDE_CONTROL: &str = "control";

/// Délai entre le masquage du panneau et l'envoi de la commande (ms).
pub const POST_DELAY_MS: u32 = 50;

/// Durée du verrou anti double-clic après un envoi (ms).
pub const REENTRANCY_GUARD_MS: u32 = 300;

/// Script + CSS à injecter. Dérivé, sans identité propre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPayload {
    pub script: String,
    pub css: String,
}

/// Les cinq boutons possibles du panneau, dans leur ordre d'affichage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelButton {
    Home,
    Minimize,
    Maximize,
    Close,
    Fullscreen,
}

impl PanelButton {
    pub const ALL: [PanelButton; 5] = [
        Self::Home,
        Self::Minimize,
        Self::Maximize,
        Self::Close,
        Self::Fullscreen,
    ];

    /// Nom utilisé dans `hide=`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
            Self::Close => "close",
            Self::Fullscreen => "fullscreen",
        }
    }

    /// Action postée par le bouton (voir [`crate::bridge::PanelAction`]).
    pub fn action(self) -> &'static str {
        match self {
            Self::Home => "return-to-login",
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
            Self::Close => "close",
            Self::Fullscreen => "toggle-fullscreen",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Home => "#4361ee",
            Self::Minimize => "#f9c74f",
            Self::Maximize => "#2ec4b6",
            Self::Close => "#e63946",
            Self::Fullscreen => "#6a4c93",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Self::Home => ICON_HOME,
            Self::Minimize => ICON_MINIMIZE,
            Self::Maximize => ICON_MAXIMIZE,
            Self::Close => ICON_CLOSE,
            Self::Fullscreen => ICON_FULLSCREEN,
        }
    }

    /// Le bouton plein écran occupe toute la largeur du panneau.
    fn full_width(self) -> bool {
        self == Self::Fullscreen
    }
}

/// Description d'un bouton telle que sérialisée dans le script.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ButtonSpec {
    name: &'static str,
    color: &'static str,
    icon: &'static str,
    action: &'static str,
    full_width: bool,
}

/// Boutons affichés : les cinq candidats moins ceux nommés dans `hidden`.
pub fn panel_buttons(hidden: &HiddenFeatures) -> Vec<PanelButton> {
    if hidden.contains(HIDE_CONTROL) {
        return Vec::new();
    }
    PanelButton::ALL
        .into_iter()
        .filter(|button| !hidden.contains(button.name()))
        .collect()
}

/// Construit le script et la CSS du panneau.
pub fn build(hidden: &HiddenFeatures) -> InjectionPayload {
    let mut css = styles::base_css(hidden);
    css.push_str(styles::CONTROL_PANEL_CSS);

    if hidden.contains(HIDE_CONTROL) {
        return InjectionPayload {
            script: DISABLED_SCRIPT.to_string(),
            css,
        };
    }

    let buttons: Vec<ButtonSpec> = panel_buttons(hidden)
        .into_iter()
        .map(|b| ButtonSpec {
            name: b.name(),
            color: b.color(),
            icon: b.icon(),
            action: b.action(),
            full_width: b.full_width(),
        })
        .collect();
    // Sérialiser des &'static str ne peut pas échouer.
    let buttons_json = serde_json::to_string(&buttons).unwrap_or_else(|_| "[]".to_string());

    let script = PANEL_SCRIPT
        .replace("__BUTTONS__", &buttons_json)
        .replace("__RELAY__", CONTROL_RELAY)
        .replace("__REQUEST__", CONTROL_REQUEST)
        .replace("__POST_DELAY__", &POST_DELAY_MS.to_string())
        .replace("__GUARD__", &REENTRANCY_GUARD_MS.to_string());

    InjectionPayload { script, css }
}

/// Script no-op quand `hide=control`.
const DISABLED_SCRIPT: &str = "void 0;";

const ICON_HOME: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M3 9l9-7 9 7v11a2 2 0 01-2 2H5a2 2 0 01-2-2z"></path><polyline points="9 22 9 12 15 12 15 22"></polyline></svg>"#;
const ICON_MINIMIZE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><line x1="5" y1="12" x2="19" y2="12"></line></svg>"#;
const ICON_MAXIMIZE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><rect x="3" y="3" width="18" height="18" rx="2" ry="2"></rect></svg>"#;
const ICON_CLOSE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><line x1="18" y1="6" x2="6" y2="18"></line><line x1="6" y1="6" x2="18" y2="18"></line></svg>"#;
const ICON_FULLSCREEN: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M8 3H5a2 2 0 0 0-2 2v3"></path><path d="M21 8V5a2 2 0 0 0-2-2h-3"></path><path d="M3 16v3a2 2 0 0 0 2 2h3"></path><path d="M16 21h3a2 2 0 0 0 2-2v-3"></path></svg>"#;

/// Gabarit du panneau. Les jetons `__X__` sont substitués par [`build`].
const PANEL_SCRIPT: &str = r#"(function () {
  if (window.__kioskshellPanel) { return; }
  window.__kioskshellPanel = true;

  const buttons = __BUTTONS__;
  let panel = null;
  let dragRegion = null;
  let visible = false;
  let processing = false;

  const setDragRegion = (open) => {
    dragRegion = dragRegion || document.querySelector('.drag-region');
    if (!dragRegion) { return; }
    dragRegion.style.height = open ? '128px' : '5px';
    dragRegion.style.opacity = open ? '0.1' : '0';
  };

  const post = (action) => {
    window.postMessage({ type: '__RELAY__', action: action }, '*');
  };

  const createPanel = () => {
    const existing = document.getElementById('kioskshell-floating-controls');
    if (existing) { return existing; }

    const root = document.createElement('div');
    root.id = 'kioskshell-floating-controls';
    root.className = 'no-select';
    root.style.cssText = 'position: fixed; top: 50%; left: 50%; transform: translate(-50%, -50%); z-index: 999999; display: none; background-color: rgba(23, 25, 35, 0.85); backdrop-filter: blur(10px); padding: 16px; border-radius: 16px; box-shadow: 0 4px 24px rgba(0,0,0,0.3); border: 1px solid rgba(255,255,255,0.1); box-sizing: content-box;';

    const layout = document.createElement('div');
    layout.style.cssText = 'width: 118px; display: flex; flex-wrap: wrap; justify-content: center; gap: 14px; box-sizing: border-box;';
    root.appendChild(layout);

    buttons.forEach((spec) => {
      const button = document.createElement('div');
      button.className = 'no-select';
      button.dataset.control = spec.name;
      button.style.cssText = 'background-color: ' + spec.color + '; border-radius: 12px; padding: 12px; display: flex; align-items: center; justify-content: center; cursor: pointer; color: white; height: 52px; box-sizing: border-box; box-shadow: 0 2px 10px rgba(0,0,0,0.15); transition: all 0.3s cubic-bezier(0.16, 1, 0.3, 1);' + (spec.fullWidth ? 'width: 118px;' : 'width: 52px;');
      button.innerHTML = spec.icon;
      button.onmouseover = () => { button.style.transform = 'translateY(-3px)'; button.style.filter = 'brightness(1.1)'; };
      button.onmouseout = () => { button.style.transform = 'translateY(0)'; button.style.filter = 'brightness(1)'; };
      button.onclick = (e) => {
        e.stopPropagation();
        if (processing) { return; }
        processing = true;
        window.hideControlPanel();
        setTimeout(() => {
          post(spec.action);
          setTimeout(() => { processing = false; }, __GUARD__);
        }, __POST_DELAY__);
      };
      layout.appendChild(button);
    });

    document.body.appendChild(root);
    return root;
  };

  window.hideControlPanel = () => {
    visible = false;
    if (panel) { panel.style.display = 'none'; }
    setDragRegion(false);
  };

  window.toggleControlPanel = () => {
    if (processing) { return; }
    panel = panel || createPanel();
    visible = !visible;
    panel.style.display = visible ? 'block' : 'none';
    setDragRegion(visible);
  };

  document.addEventListener('keydown', (e) => {
    if (e.ctrlKey && e.shiftKey && e.altKey) {
      if (e.repeat || processing) { return; }
      window.toggleControlPanel();
    }
  });

  document.addEventListener('click', (e) => {
    if (processing || !visible || !panel) { return; }
    if (!panel.contains(e.target) && !e.target.classList.contains('drag-region')) {
      window.hideControlPanel();
    }
  });

  window.addEventListener('message', (event) => {
    const data = event.data;
    if (!data || typeof data !== 'object') { return; }
    if (data.type === 'show-control-panel') {
      window.toggleControlPanel();
    } else if (data.type === '__RELAY__') {
      window.postMessage({ type: '__REQUEST__', action: data.action, data: data.data }, '*');
    }
  });
})();
"#;

//! Réactions d'une surface à ses propres événements de cycle de vie.
//!
//! Un [`SurfaceController`] par surface vivante. Il décore le document
//! (styles, comportements), remplace les pages en échec par la page
//! d'erreur, filtre le clavier et injecte le panneau de contrôle une seule
//! fois par document.
//!
//! ## Injection du panneau
//!
//! ```text
//! content-ready ──► begin_injection ──► sonde `!!document && !!document.body`
//!                                              │ (asynchrone)
//!                                              ▼
//!                   complete_injection ──► CSS + script ──► Injected
//!                          │
//!                          └─► échec de sonde / surface fermée / cycle périmé :
//!                              journalisé, abandonné, pas de nouvel essai
//! ```
//!
//! Le cycle avance à chaque début de navigation : une sonde lancée pour un
//! document précédent est ignorée à son retour.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::HiddenFeatures;
use crate::host::{Completion, EventResponse, HostError, SurfaceHost};
use crate::inject;
use crate::input::{self, InputDecision, KeyInput};
use crate::pages::{self, ABORTED_ERROR_CODE};
use crate::styles::{self, StyleKey};
use crate::surface::{SurfaceId, SurfaceRole};

/// Sonde de présence du `<body>`.
pub const BODY_PROBE_SCRIPT: &str = "!!document && !!document.body";

/// Bascule du panneau injecté (accord Ctrl+Shift+Alt sur une fenêtre enfant).
pub const TOGGLE_PANEL_SCRIPT: &str =
    "if (window.toggleControlPanel) { window.toggleControlPanel(); }";

const MAIN_BEHAVIOURS_SCRIPT: &str = r#"(function () {
  document.body.classList.add('disable-select');
  if (!document.querySelector('.drag-region')) {
    const dragRegion = document.createElement('div');
    dragRegion.className = 'drag-region';
    document.body.appendChild(dragRegion);
  }
  document.addEventListener('dblclick', (e) => { e.stopPropagation(); }, true);
})();"#;

const CHILD_BEHAVIOURS_SCRIPT: &str = r#"(function () {
  const editable = (el) => !!el && (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.isContentEditable);
  if (!document.querySelector('.drag-region')) {
    const dragRegion = document.createElement('div');
    dragRegion.className = 'drag-region';
    document.body.appendChild(dragRegion);
  }
  document.addEventListener('selectstart', (e) => { if (!editable(e.target)) { e.preventDefault(); } }, false);
  document.addEventListener('dragstart', (e) => { if (!editable(e.target)) { e.preventDefault(); } }, false);
  document.addEventListener('contextmenu', (e) => { e.preventDefault(); }, false);
  document.addEventListener('dblclick', (e) => { e.stopPropagation(); }, true);
  document.addEventListener('keydown', (e) => {
    if (e.altKey && e.key === 'F4') {
      e.preventDefault();
      e.stopPropagation();
      return;
    }
    const key = (e.key || '').toLowerCase();
    if (!editable(e.target) && (e.ctrlKey || e.metaKey) && ['a', 'c', 'v', 'x'].includes(key)) {
      e.preventDefault();
    }
  });
  document.body.classList.add('disable-select');
})();"#;

/// Résultat d'une étape de l'injection du panneau.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// Sonde envoyée, résultat attendu.
    Probing(Completion),
    Injected,
    /// Déjà fait (ou déjà en cours) pour ce document.
    AlreadyInjected,
    /// Rôle sans panneau injecté.
    NotApplicable,
    /// Résultat d'une sonde d'un document précédent, ou ticket inconnu.
    Stale,
    SurfaceGone,
    ProbeFailed(String),
    BodyMissing,
    Failed(String),
}

/// Sort d'une navigation en échec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureHandling {
    Ignored,
    ErrorPage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Injection {
    Pending,
    Probing { completion: Completion, cycle: u64 },
    Done,
}

#[derive(Debug)]
pub struct SurfaceController {
    id: SurfaceId,
    role: SurfaceRole,
    hidden: HiddenFeatures,
    cycle: u64,
    injection: Injection,
}

impl SurfaceController {
    pub fn new(id: SurfaceId, role: SurfaceRole, hidden: HiddenFeatures) -> Self {
        Self {
            id,
            role,
            hidden,
            cycle: 0,
            injection: Injection::Pending,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn role(&self) -> SurfaceRole {
        self.role
    }

    pub fn hidden(&self) -> &HiddenFeatures {
        &self.hidden
    }

    /// Nouveau document : l'injection redevient possible.
    pub fn on_navigation_started(&mut self) {
        self.cycle += 1;
        self.injection = Injection::Pending;
        debug!(surface = %self.id, cycle = self.cycle, "Navigation started");
    }

    /// Styles et comportements de base du document.
    pub fn on_document_ready(&self, host: &mut dyn SurfaceHost) -> Result<(), HostError> {
        match self.role {
            SurfaceRole::Main => {
                host.insert_css(self.id, StyleKey::Base, &styles::base_css(&self.hidden))?;
                host.execute_script(self.id, MAIN_BEHAVIOURS_SCRIPT, None)?;
            }
            SurfaceRole::Child => {
                host.insert_css(
                    self.id,
                    StyleKey::NewWindow,
                    &styles::new_window_css(&self.hidden),
                )?;
                host.execute_script(self.id, CHILD_BEHAVIOURS_SCRIPT, None)?;
            }
            SurfaceRole::Overlay => {}
        }
        Ok(())
    }

    /// Réapplique la barre de défilement sous sa clé stable.
    pub fn reapply_scrollbar(&self, host: &mut dyn SurfaceHost) -> Result<(), HostError> {
        if self.role == SurfaceRole::Overlay {
            return Ok(());
        }
        host.insert_css(
            self.id,
            StyleKey::Scrollbar,
            styles::scrollbar_css(&self.hidden),
        )
    }

    /// Redirige vers la page d'erreur, sauf annulation par l'utilisateur.
    pub fn on_navigation_failed(
        &self,
        host: &mut dyn SurfaceHost,
        code: i32,
        description: &str,
        url: &str,
    ) -> FailureHandling {
        if code == ABORTED_ERROR_CODE {
            debug!(surface = %self.id, url, "Navigation aborted, no redirect");
            return FailureHandling::Ignored;
        }
        warn!(surface = %self.id, url, code, description, "Page failed to load");

        let error_url = pages::error_page_url(code, description, self.role.is_child());
        if let Err(e) = host.load_url(self.id, &error_url) {
            warn!(surface = %self.id, error = %e, "Cannot show error page");
        }
        FailureHandling::ErrorPage(error_url)
    }

    /// Filtrage clavier au niveau hôte.
    pub fn on_before_input(&self, host: &mut dyn SurfaceHost, key: &KeyInput) -> EventResponse {
        match input::decide(self.role, key) {
            InputDecision::Forward => EventResponse::Continue,
            InputDecision::Suppress => EventResponse::Suppress,
            InputDecision::TogglePanel => {
                if let Err(e) = host.execute_script(self.id, TOGGLE_PANEL_SCRIPT, None) {
                    debug!(surface = %self.id, error = %e, "Panel toggle dropped");
                }
                EventResponse::Suppress
            }
        }
    }

    /// Première étape : sonde du document.
    pub fn begin_injection(
        &mut self,
        host: &mut dyn SurfaceHost,
        completion: Completion,
    ) -> InjectionOutcome {
        if self.role == SurfaceRole::Overlay {
            return InjectionOutcome::NotApplicable;
        }
        if self.injection != Injection::Pending {
            return InjectionOutcome::AlreadyInjected;
        }
        if !host.is_alive(self.id) {
            return InjectionOutcome::SurfaceGone;
        }
        if let Err(e) = host.execute_script(self.id, BODY_PROBE_SCRIPT, Some(completion)) {
            warn!(surface = %self.id, error = %e, "Body probe could not be sent");
            self.injection = Injection::Done;
            return InjectionOutcome::Failed(e.to_string());
        }
        self.injection = Injection::Probing {
            completion,
            cycle: self.cycle,
        };
        InjectionOutcome::Probing(completion)
    }

    /// Seconde étape : résultat de la sonde, puis injection.
    pub fn complete_injection(
        &mut self,
        host: &mut dyn SurfaceHost,
        completion: Completion,
        probe: Result<Value, String>,
    ) -> InjectionOutcome {
        let Injection::Probing {
            completion: expected,
            cycle,
        } = self.injection
        else {
            return InjectionOutcome::Stale;
        };
        if expected != completion || cycle != self.cycle {
            return InjectionOutcome::Stale;
        }
        // Pas de nouvel essai pour ce document, quoi qu'il arrive.
        self.injection = Injection::Done;

        if !host.is_alive(self.id) {
            return InjectionOutcome::SurfaceGone;
        }
        let ready = match probe {
            Ok(value) => value == Value::Bool(true),
            Err(reason) => {
                warn!(surface = %self.id, %reason, "Body probe failed, skipping injection");
                return InjectionOutcome::ProbeFailed(reason);
            }
        };
        if !ready {
            warn!(surface = %self.id, "Document body missing, skipping injection");
            return InjectionOutcome::BodyMissing;
        }

        let payload = inject::build(&self.hidden);
        if let Err(e) = host.insert_css(self.id, StyleKey::Controls, &payload.css) {
            warn!(surface = %self.id, error = %e, "Control styles not inserted");
            return InjectionOutcome::Failed(e.to_string());
        }
        if let Err(e) = host.execute_script(self.id, &payload.script, None) {
            warn!(surface = %self.id, error = %e, "Control script not executed");
            return InjectionOutcome::Failed(e.to_string());
        }

        info!(surface = %self.id, role = %self.role, "Control panel injected");
        InjectionOutcome::Injected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceSpec;
    use crate::testing::{Call, FakeHost};
    use serde_json::json;

    fn setup(role: SurfaceRole, hide: &str) -> (FakeHost, SurfaceController) {
        let mut host = FakeHost::new();
        let spec = match role {
            SurfaceRole::Main => SurfaceSpec::main(&Default::default()),
            SurfaceRole::Child => SurfaceSpec::child(),
            SurfaceRole::Overlay => SurfaceSpec::overlay(),
        };
        let id = host.create_surface(&spec).unwrap();
        (host, SurfaceController::new(id, role, HiddenFeatures::parse(hide)))
    }

    #[test]
    fn test_main_document_ready_applies_base_styles() {
        let (mut host, ctl) = setup(SurfaceRole::Main, "mouse");
        ctl.on_document_ready(&mut host).unwrap();

        let styles = &host.surface(ctl.id()).styles;
        assert!(styles[&StyleKey::Base].contains("cursor: none"));
        assert!(styles[&StyleKey::Base].contains(".drag-region"));
        let scripts = host.scripts(ctl.id());
        assert!(scripts[0].contains("disable-select"));
        assert!(scripts[0].contains("dblclick"));
    }

    #[test]
    fn test_child_document_ready_applies_strict_variant() {
        let (mut host, ctl) = setup(SurfaceRole::Child, "");
        ctl.on_document_ready(&mut host).unwrap();

        let styles = &host.surface(ctl.id()).styles;
        assert!(styles.contains_key(&StyleKey::NewWindow));
        assert!(!styles.contains_key(&StyleKey::Base));
        let script = host.scripts(ctl.id())[0];
        for needle in ["selectstart", "dragstart", "contextmenu", "'F4'", "['a', 'c', 'v', 'x']"] {
            assert!(script.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_aborted_navigation_is_ignored() {
        let (mut host, ctl) = setup(SurfaceRole::Main, "");
        let handling = ctl.on_navigation_failed(&mut host, -3, "ERR_ABORTED", "https://x.test");
        assert_eq!(handling, FailureHandling::Ignored);
        assert!(host.loads(ctl.id()).is_empty());
    }

    #[test]
    fn test_failed_navigation_redirects_to_error_view() {
        let (mut host, ctl) = setup(SurfaceRole::Child, "");
        let handling =
            ctl.on_navigation_failed(&mut host, -105, "NAME_NOT_RESOLVED", "https://x.test");
        let FailureHandling::ErrorPage(url) = handling else {
            panic!("expected a redirect");
        };
        assert_eq!(host.loads(ctl.id()), vec![url.as_str()]);
        assert!(url.contains("data-code%3D%22-105%22"));
        assert!(url.contains("data-child%3D%22true%22"));
    }

    #[test]
    fn test_scrollbar_reapply_is_idempotent() {
        let (mut host, ctl) = setup(SurfaceRole::Main, "scroll");
        ctl.reapply_scrollbar(&mut host).unwrap();
        let first = host.surface(ctl.id()).styles.clone();
        ctl.reapply_scrollbar(&mut host).unwrap();
        assert_eq!(host.surface(ctl.id()).styles, first);
        assert_eq!(first.len(), 1);
        assert!(first[&StyleKey::Scrollbar].contains("width: 0 !important"));
    }

    #[test]
    fn test_child_chord_toggles_panel() {
        let (mut host, ctl) = setup(SurfaceRole::Child, "");
        let chord = KeyInput::down("Control").ctrl().shift().alt();
        assert_eq!(ctl.on_before_input(&mut host, &chord), EventResponse::Suppress);
        assert_eq!(host.scripts(ctl.id()), vec![TOGGLE_PANEL_SCRIPT]);
    }

    #[test]
    fn test_injection_pipeline_runs_once_per_document() {
        let (mut host, mut ctl) = setup(SurfaceRole::Main, "");
        let ticket = Completion(1);

        assert_eq!(ctl.begin_injection(&mut host, ticket), InjectionOutcome::Probing(ticket));
        assert_eq!(host.scripts(ctl.id()), vec![BODY_PROBE_SCRIPT]);
        assert_eq!(
            ctl.begin_injection(&mut host, Completion(2)),
            InjectionOutcome::AlreadyInjected
        );

        assert_eq!(
            ctl.complete_injection(&mut host, ticket, Ok(json!(true))),
            InjectionOutcome::Injected
        );
        assert!(host.surface(ctl.id()).styles.contains_key(&StyleKey::Controls));
        assert!(host.scripts(ctl.id())[1].contains("__kioskshellPanel"));

        assert_eq!(
            ctl.begin_injection(&mut host, Completion(3)),
            InjectionOutcome::AlreadyInjected
        );

        ctl.on_navigation_started();
        assert_eq!(
            ctl.begin_injection(&mut host, Completion(4)),
            InjectionOutcome::Probing(Completion(4))
        );
    }

    #[test]
    fn test_failed_probe_skips_without_retry() {
        let (mut host, mut ctl) = setup(SurfaceRole::Main, "");
        ctl.begin_injection(&mut host, Completion(1));
        assert_eq!(
            ctl.complete_injection(&mut host, Completion(1), Err("TypeError".into())),
            InjectionOutcome::ProbeFailed("TypeError".into())
        );
        assert_eq!(
            ctl.begin_injection(&mut host, Completion(2)),
            InjectionOutcome::AlreadyInjected
        );

        ctl.on_navigation_started();
        ctl.begin_injection(&mut host, Completion(3));
        assert_eq!(
            ctl.complete_injection(&mut host, Completion(3), Ok(json!(false))),
            InjectionOutcome::BodyMissing
        );
        assert_eq!(host.scripts(ctl.id()).len(), 2);
    }

    #[test]
    fn test_probe_from_previous_document_is_stale() {
        let (mut host, mut ctl) = setup(SurfaceRole::Main, "");
        ctl.begin_injection(&mut host, Completion(1));
        ctl.on_navigation_started();
        assert_eq!(
            ctl.complete_injection(&mut host, Completion(1), Ok(json!(true))),
            InjectionOutcome::Stale
        );
        assert!(!host.surface(ctl.id()).styles.contains_key(&StyleKey::Controls));
    }

    #[test]
    fn test_surface_closed_during_probe() {
        let (mut host, mut ctl) = setup(SurfaceRole::Child, "");
        ctl.begin_injection(&mut host, Completion(1));
        host.close(ctl.id()).unwrap();
        assert_eq!(
            ctl.complete_injection(&mut host, Completion(1), Ok(json!(true))),
            InjectionOutcome::SurfaceGone
        );
        assert!(!host.calls.iter().any(|c| matches!(c, Call::Css(..))));
    }

    #[test]
    fn test_overlay_gets_no_panel() {
        let (mut host, mut ctl) = setup(SurfaceRole::Overlay, "");
        assert_eq!(
            ctl.begin_injection(&mut host, Completion(1)),
            InjectionOutcome::NotApplicable
        );
    }
}

//! Cycle de vie des surfaces et exécution des commandes du contenu.
//!
//! ## Machines d'état
//!
//! ```text
//! Main     Absent ──create──► Created ──close──► Destroyed   (ferme aussi l'Overlay)
//! Child    ──open-window──► Created ──close──► Destroyed     (nombre quelconque)
//! Overlay  Absent ──show──► Shown ◄──show / focus perdu──► Hidden
//!                              └────────close────────► Absent
//! ```
//!
//! Une commande vise la surface qui l'a envoyée, sauf depuis l'Overlay :
//! celle-ci pilote la fenêtre principale. Une commande visant une surface
//! fermée ou inconnue répond `false` (ou `null`), jamais une erreur.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bridge::{self, CommandReply, HostNotification, RemoteCommand};
use crate::config::{self, ConfigOverrides, HiddenFeatures, Settings};
use crate::controller::{InjectionOutcome, SurfaceController};
use crate::desktop;
use crate::host::{Completion, HostError, SurfaceHost};
use crate::pages;
use crate::surface::{SurfaceId, SurfaceRecord, SurfaceRole, SurfaceSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Absent,
    Shown(SurfaceId),
    Hidden(SurfaceId),
}

impl OverlayState {
    pub fn surface(self) -> Option<SurfaceId> {
        match self {
            Self::Absent => None,
            Self::Shown(id) | Self::Hidden(id) => Some(id),
        }
    }
}

/// Opération asynchrone en attente de son ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Injection(SurfaceId),
    ClearCache,
}

#[derive(Debug)]
struct SurfaceEntry {
    record: SurfaceRecord,
    controller: SurfaceController,
}

#[derive(Debug)]
pub struct SurfaceLifecycleManager {
    main: Option<SurfaceId>,
    overlay: OverlayState,
    surfaces: BTreeMap<SurfaceId, SurfaceEntry>,
    /// Fonctionnalités masquées figées à la création de Main.
    captured_hidden: HiddenFeatures,
    overrides: ConfigOverrides,
    pending: HashMap<Completion, Pending>,
    next_ticket: u64,
}

impl Default for SurfaceLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceLifecycleManager {
    pub fn new() -> Self {
        Self {
            main: None,
            overlay: OverlayState::Absent,
            surfaces: BTreeMap::new(),
            captured_hidden: HiddenFeatures::default(),
            overrides: ConfigOverrides::default(),
            pending: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn main(&self) -> Option<SurfaceId> {
        self.main
    }

    pub fn overlay(&self) -> OverlayState {
        self.overlay
    }

    pub fn children(&self) -> Vec<SurfaceId> {
        self.surfaces
            .iter()
            .filter(|(_, e)| e.record.role == SurfaceRole::Child && !e.record.destroyed)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn role_of(&self, surface: SurfaceId) -> Option<SurfaceRole> {
        self.surfaces.get(&surface).map(|e| e.record.role)
    }

    pub fn controller_mut(&mut self, surface: SurfaceId) -> Option<&mut SurfaceController> {
        self.surfaces
            .get_mut(&surface)
            .filter(|e| !e.record.destroyed)
            .map(|e| &mut e.controller)
    }

    fn ticket(&mut self, pending: Pending) -> Completion {
        self.next_ticket += 1;
        let completion = Completion(self.next_ticket);
        self.pending.insert(completion, pending);
        completion
    }

    fn register(&mut self, id: SurfaceId, role: SurfaceRole, hidden: HiddenFeatures) {
        let record = SurfaceRecord::new(role, hidden);
        let controller = SurfaceController::new(id, role, record.hidden.clone());
        self.surfaces.insert(id, SurfaceEntry { record, controller });
    }

    fn is_live(&self, host: &dyn SurfaceHost, surface: SurfaceId) -> bool {
        self.surfaces
            .get(&surface)
            .is_some_and(|e| !e.record.destroyed)
            && host.is_alive(surface)
    }

    fn live_main(&self, host: &dyn SurfaceHost) -> Option<SurfaceId> {
        self.main.filter(|id| self.is_live(host, *id))
    }

    // ── Main ──────────────────────────────────────────────────────────────

    /// Crée la surface principale, sauf si elle existe déjà.
    pub fn create_main(
        &mut self,
        host: &mut dyn SurfaceHost,
        settings: &Settings,
    ) -> Option<SurfaceId> {
        if let Some(existing) = self.live_main(host) {
            warn!(surface = %existing, "Main surface already exists, creation ignored");
            return None;
        }

        let id = match host.create_surface(&SurfaceSpec::main(settings)) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Main surface creation failed");
                return None;
            }
        };
        self.captured_hidden = settings.hidden_features.clone();
        self.register(id, SurfaceRole::Main, self.captured_hidden.clone());
        self.main = Some(id);

        let url = match settings.start_url.as_deref() {
            Some(start) => normalize_address(start),
            None => pages::login_page_url(),
        };
        if let Err(e) = host.load_url(id, &url) {
            warn!(surface = %id, error = %e, "Initial load failed");
        }
        info!(
            surface = %id,
            fullscreen = settings.fullscreen,
            pinned = settings.pinned,
            "Main surface created"
        );
        Some(id)
    }

    fn load_login(&self, host: &mut dyn SurfaceHost) -> bool {
        let Some(main) = self.live_main(host) else {
            return false;
        };
        report(host.load_url(main, &pages::login_page_url()), main, "load login page")
    }

    // ── Child ─────────────────────────────────────────────────────────────

    /// Ouvre `url` dans une nouvelle fenêtre enfant.
    pub fn open_child(&mut self, host: &mut dyn SurfaceHost, url: &str) -> Option<SurfaceId> {
        let id = match host.create_surface(&SurfaceSpec::child()) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, url, "Child surface creation failed");
                return None;
            }
        };
        self.register(id, SurfaceRole::Child, self.captured_hidden.clone());
        if let Err(e) = host.load_url(id, url) {
            warn!(surface = %id, error = %e, "Child load failed");
        }
        info!(surface = %id, url, "Child surface opened");
        Some(id)
    }

    // ── Overlay ───────────────────────────────────────────────────────────

    /// Affiche l'Overlay (création centrée sur Main si absente) ou le masque
    /// s'il est visible.
    pub fn toggle_overlay(&mut self, host: &mut dyn SurfaceHost) {
        match self.overlay {
            OverlayState::Shown(id) if self.is_live(host, id) => {
                if report(host.hide(id), id, "hide overlay") {
                    self.overlay = OverlayState::Hidden(id);
                }
            }
            _ => self.show_overlay(host),
        }
    }

    pub fn show_overlay(&mut self, host: &mut dyn SurfaceHost) {
        if let Some(id) = self.overlay.surface().filter(|id| self.is_live(&*host, *id)) {
            if report(host.show(id), id, "show overlay") {
                self.overlay = OverlayState::Shown(id);
            }
            return;
        }

        let spec = SurfaceSpec::overlay();
        let id = match host.create_surface(&spec) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Overlay creation failed");
                return;
            }
        };
        self.register(id, SurfaceRole::Overlay, HiddenFeatures::default());
        self.overlay = OverlayState::Shown(id);

        if let Some(main) = self.live_main(host)
            && let Ok(bounds) = host.bounds(main)
        {
            let (x, y) = bounds.centered(spec.width, spec.height);
            report(host.set_position(id, x, y), id, "center overlay");
        }
        report(host.load_url(id, &pages::overlay_page_url()), id, "load overlay");
        debug!(surface = %id, "Overlay created");
    }

    pub fn on_focus_lost(&mut self, host: &mut dyn SurfaceHost, surface: SurfaceId) {
        if self.overlay != OverlayState::Shown(surface) {
            return;
        }
        if report(host.hide(surface), surface, "hide overlay") {
            self.overlay = OverlayState::Hidden(surface);
        }
    }

    // ── Fermeture ─────────────────────────────────────────────────────────

    /// Demande la fermeture à l'hôte ; l'entrée reste marquée détruite
    /// jusqu'à l'événement `Closed`.
    fn close_surface(
        &mut self,
        host: &mut dyn SurfaceHost,
        surface: SurfaceId,
        action: &str,
    ) -> bool {
        if !report(host.close(surface), surface, action) {
            return false;
        }
        if let Some(entry) = self.surfaces.get_mut(&surface) {
            entry.record.destroyed = true;
        }
        true
    }

    /// La surface a été détruite par l'hôte : son entrée disparaît.
    pub fn on_closed(&mut self, host: &mut dyn SurfaceHost, surface: SurfaceId) {
        let Some(entry) = self.surfaces.remove(&surface) else {
            return;
        };
        let role = entry.record.role;
        self.pending
            .retain(|_, p| *p != Pending::Injection(surface));
        info!(%surface, %role, "Surface closed");

        match role {
            SurfaceRole::Main => {
                if self.main == Some(surface) {
                    self.main = None;
                }
                if let Some(overlay) = self.overlay.surface() {
                    if host.is_alive(overlay) {
                        self.close_surface(host, overlay, "close overlay");
                    }
                    // Le `Closed` de l'Overlay, s'il arrive, ne trouvera plus rien.
                    self.surfaces.remove(&overlay);
                    self.pending
                        .retain(|_, p| *p != Pending::Injection(overlay));
                    self.overlay = OverlayState::Absent;
                }
            }
            SurfaceRole::Overlay => {
                if self.overlay.surface() == Some(surface) {
                    self.overlay = OverlayState::Absent;
                }
            }
            SurfaceRole::Child => {}
        }
    }

    /// Toutes les fenêtres sont fermées : on libère tout et on quitte.
    pub fn teardown(&mut self, host: &mut dyn SurfaceHost) {
        for surface in [self.overlay.surface(), self.main].into_iter().flatten() {
            if host.is_alive(surface) {
                report(host.close(surface), surface, "close on teardown");
            }
        }
        self.surfaces.clear();
        self.pending.clear();
        self.main = None;
        self.overlay = OverlayState::Absent;
        info!("All windows closed, exiting");
        host.request_exit();
    }

    // ── Surcharges de configuration ───────────────────────────────────────

    pub fn overrides(&self) -> &ConfigOverrides {
        &self.overrides
    }

    /// Enregistre la couche `theme` / `hide` et prévient Main.
    pub fn apply_overrides(
        &mut self,
        host: &mut dyn SurfaceHost,
        settings: &Settings,
        overrides: ConfigOverrides,
    ) {
        self.overrides = overrides;
        let Some(main) = self.live_main(host) else {
            return;
        };
        let view = settings.file.with_overrides(&self.overrides);
        let script = bridge::notification_script(&HostNotification::ConfigUpdated(view));
        report(host.execute_script(main, &script, None), main, "send config-updated");
    }

    // ── Commandes ─────────────────────────────────────────────────────────

    /// Surface effectivement visée par une commande de `sender`.
    fn target(
        &self,
        host: &dyn SurfaceHost,
        sender: SurfaceId,
    ) -> Option<(SurfaceId, SurfaceRole)> {
        if !self.is_live(host, sender) {
            return None;
        }
        let role = self.role_of(sender)?;
        let target = match role {
            SurfaceRole::Overlay => self.main?,
            SurfaceRole::Main | SurfaceRole::Child => sender,
        };
        if !self.is_live(host, target) {
            return None;
        }
        Some((target, self.role_of(target)?))
    }

    pub fn dispatch(
        &mut self,
        host: &mut dyn SurfaceHost,
        settings: &Settings,
        sender: SurfaceId,
        command: RemoteCommand,
    ) -> CommandReply {
        debug!(%sender, channel = command.channel(), "Command received");

        match command {
            RemoteCommand::GetConfig => {
                CommandReply::Config(settings.file.with_overrides(&self.overrides))
            }
            RemoteCommand::GetBackgroundPath => {
                let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                CommandReply::Path(config::resolve_background_path(
                    settings.background_path.as_deref(),
                    &base,
                ))
            }
            RemoteCommand::ShowControls => {
                self.toggle_overlay(host);
                CommandReply::None
            }
            RemoteCommand::ContentReady => self.content_ready(host, sender),
            RemoteCommand::ClearCache => self.clear_cache(host),
            targeted => self.dispatch_targeted(host, settings, sender, targeted),
        }
    }

    /// Commandes appliquées à la surface visée.
    fn dispatch_targeted(
        &mut self,
        host: &mut dyn SurfaceHost,
        settings: &Settings,
        sender: SurfaceId,
        command: RemoteCommand,
    ) -> CommandReply {
        let Some((target, role)) = self.target(host, sender) else {
            debug!(%sender, "Command target is gone");
            return match command {
                RemoteCommand::DragStart => CommandReply::None,
                _ => CommandReply::Flag(false),
            };
        };

        match command {
            RemoteCommand::DragStart => {
                let script = bridge::notification_script(&HostNotification::WindowDragging);
                report(host.execute_script(target, &script, None), target, "send window-dragging");
                CommandReply::None
            }
            RemoteCommand::Navigate(url) => {
                if role != SurfaceRole::Main {
                    return CommandReply::Flag(false);
                }
                let url = normalize_address(&url);
                CommandReply::Flag(report(host.load_url(target, &url), target, "navigate"))
            }
            RemoteCommand::ReturnToLogin => CommandReply::Flag(match role {
                SurfaceRole::Main if settings.single_page_mode => match desktop::home_dir() {
                    Some(home) => report(host.open_external(&home), target, "open home directory"),
                    None => {
                        warn!("Home directory unknown");
                        false
                    }
                },
                SurfaceRole::Main => self.load_login(host),
                SurfaceRole::Child => self.close_surface(host, target, "close child"),
                SurfaceRole::Overlay => false,
            }),
            RemoteCommand::Minimize => {
                CommandReply::Flag(report(host.minimize(target), target, "minimize"))
            }
            RemoteCommand::Maximize => {
                let toggled = host
                    .is_maximized(target)
                    .and_then(|maximized| host.set_maximized(target, !maximized));
                CommandReply::Flag(report(toggled, target, "maximize"))
            }
            RemoteCommand::Close => CommandReply::Flag(self.close_surface(host, target, "close")),
            RemoteCommand::ToggleFullscreen => {
                let flipped = host.is_fullscreen(target).and_then(|fullscreen| {
                    host.set_fullscreen(target, !fullscreen).map(|()| !fullscreen)
                });
                match flipped {
                    Ok(state) => CommandReply::Flag(state),
                    Err(e) => {
                        warn!(surface = %target, error = %e, "Fullscreen toggle failed");
                        CommandReply::Flag(false)
                    }
                }
            }
            // Routées dans `dispatch` avant toute résolution de cible.
            RemoteCommand::GetConfig
            | RemoteCommand::GetBackgroundPath
            | RemoteCommand::ShowControls
            | RemoteCommand::ContentReady
            | RemoteCommand::ClearCache => CommandReply::Flag(false),
        }
    }

    fn content_ready(&mut self, host: &mut dyn SurfaceHost, sender: SurfaceId) -> CommandReply {
        if !self.is_live(host, sender) {
            return CommandReply::Flag(false);
        }
        let completion = self.ticket(Pending::Injection(sender));
        let outcome = match self.controller_mut(sender) {
            Some(controller) => controller.begin_injection(host, completion),
            None => InjectionOutcome::SurfaceGone,
        };
        if !matches!(outcome, InjectionOutcome::Probing(_)) {
            self.pending.remove(&completion);
            debug!(surface = %sender, ?outcome, "No injection for this document");
        }
        // `true` tant que le document a (ou aura) son panneau.
        CommandReply::Flag(matches!(
            outcome,
            InjectionOutcome::Probing(_) | InjectionOutcome::AlreadyInjected
        ))
    }

    fn clear_cache(&mut self, host: &mut dyn SurfaceHost) -> CommandReply {
        let Some(main) = self.live_main(host) else {
            return CommandReply::Flag(false);
        };
        let completion = self.ticket(Pending::ClearCache);
        if report(host.clear_storage(main, completion), main, "clear storage") {
            CommandReply::Flag(true)
        } else {
            self.pending.remove(&completion);
            CommandReply::Flag(false)
        }
    }

    // ── Retours asynchrones ───────────────────────────────────────────────

    pub fn on_script_completed(
        &mut self,
        host: &mut dyn SurfaceHost,
        surface: SurfaceId,
        completion: Completion,
        result: Result<Value, String>,
    ) -> Option<InjectionOutcome> {
        match self.pending.remove(&completion) {
            Some(Pending::Injection(target)) if target == surface => {
                let controller = self.controller_mut(surface)?;
                Some(controller.complete_injection(host, completion, result))
            }
            Some(other) => {
                debug!(%surface, ?completion, ?other, "Completion does not match surface");
                None
            }
            None => None,
        }
    }

    pub fn on_storage_cleared(&mut self, host: &mut dyn SurfaceHost, completion: Completion) {
        if self.pending.remove(&completion) != Some(Pending::ClearCache) {
            return;
        }
        info!("Storage cleared, back to the login page");
        self.load_login(host);
    }
}

/// Préfixe `http://` quand l'adresse ne porte pas de schéma.
///
/// Un schéma n'est reconnu qu'en tête d'adresse (`ALPHA *(ALPHA / DIGIT /
/// "+" / "-" / ".")` suivi de `://`), ou sous la forme `data:` / `about:`.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    if has_scheme(address) {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

fn has_scheme(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("about:") {
        return true;
    }
    let Some((scheme, _)) = lower.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Journalise un échec d'appel hôte ; vrai si l'appel a abouti.
fn report(result: Result<(), HostError>, surface: SurfaceId, action: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(%surface, action, error = %e, "Host call failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeHost};
    use serde_json::json;

    fn started(settings: &Settings) -> (FakeHost, SurfaceLifecycleManager, SurfaceId) {
        let mut host = FakeHost::new();
        let mut manager = SurfaceLifecycleManager::new();
        let main = manager.create_main(&mut host, settings).unwrap();
        (host, manager, main)
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("example.com"), "http://example.com");
        assert_eq!(normalize_address("localhost:8080/x"), "http://localhost:8080/x");
        assert_eq!(normalize_address("https://a.test"), "https://a.test");
        assert_eq!(normalize_address("HTTP://A.TEST"), "HTTP://A.TEST");
        assert_eq!(normalize_address("file:///tmp/a.html"), "file:///tmp/a.html");
        assert_eq!(normalize_address("  about:blank "), "about:blank");
    }

    #[test]
    fn test_embedded_url_is_not_a_scheme() {
        let address = "portal.example/login?next=https://sso.example";
        let normalized = normalize_address(address);
        assert_eq!(normalized, "http://portal.example/login?next=https://sso.example");
        assert!(url::Url::parse(&normalized).is_ok());
        assert_eq!(normalize_address("1abc://x"), "http://1abc://x");
    }

    #[test]
    fn test_navigate_with_embedded_url_loads_main() {
        let settings = Settings {
            start_url: Some("kiosk.local/?return=https://kiosk.local/home".into()),
            ..Default::default()
        };
        let (mut host, mut manager, main) = started(&settings);
        assert_eq!(
            host.loads(main),
            vec!["http://kiosk.local/?return=https://kiosk.local/home"]
        );

        let reply = manager.dispatch(
            &mut host,
            &settings,
            main,
            RemoteCommand::Navigate("portal.example/login?next=https://sso.example".into()),
        );
        assert_eq!(reply, CommandReply::Flag(true));
    }

    #[test]
    fn test_main_loads_start_url_or_login() {
        let settings = Settings {
            start_url: Some("kiosk.local".into()),
            ..Default::default()
        };
        let (host, _, main) = started(&settings);
        assert_eq!(host.loads(main), vec!["http://kiosk.local"]);

        let (host, _, main) = started(&Settings::default());
        assert_eq!(host.loads(main), vec![pages::login_page_url().as_str()]);
    }

    #[test]
    fn test_second_main_is_rejected() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        assert_eq!(manager.create_main(&mut host, &settings), None);
        assert_eq!(manager.main(), Some(main));
        assert_eq!(host.ids_with_role(SurfaceRole::Main).len(), 1);
    }

    #[test]
    fn test_close_then_minimize_returns_false() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);

        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::Close);
        assert_eq!(reply, CommandReply::Flag(true));
        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::Minimize);
        assert_eq!(reply, CommandReply::Flag(false));

        manager.on_closed(&mut host, main);
        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::Minimize);
        assert_eq!(reply, CommandReply::Flag(false));
    }

    #[test]
    fn test_unknown_sender_gets_false() {
        let settings = Settings::default();
        let (mut host, mut manager, _) = started(&settings);
        let reply = manager.dispatch(&mut host, &settings, SurfaceId(99), RemoteCommand::Maximize);
        assert_eq!(reply, CommandReply::Flag(false));
    }

    #[test]
    fn test_return_to_login_single_page_opens_home() {
        let settings = Settings {
            single_page_mode: true,
            ..Default::default()
        };
        let (mut host, mut manager, main) = started(&settings);
        let loads_before = host.loads(main).len();

        manager.dispatch(&mut host, &settings, main, RemoteCommand::ReturnToLogin);

        assert_eq!(host.loads(main).len(), loads_before);
        if let Some(home) = desktop::home_dir() {
            assert!(host.calls.contains(&Call::OpenExternal(home)));
        }
    }

    #[test]
    fn test_return_to_login_main_and_child() {
        let settings = Settings {
            start_url: Some("https://app.test".into()),
            ..Default::default()
        };
        let (mut host, mut manager, main) = started(&settings);
        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::ReturnToLogin);
        assert_eq!(reply, CommandReply::Flag(true));
        assert_eq!(host.loads(main).last().copied(), Some(pages::login_page_url().as_str()));

        let child = manager.open_child(&mut host, "https://other.test").unwrap();
        let reply = manager.dispatch(&mut host, &settings, child, RemoteCommand::ReturnToLogin);
        assert_eq!(reply, CommandReply::Flag(true));
        assert!(host.calls.contains(&Call::Close(child)));
        assert!(host.is_alive(main));
    }

    #[test]
    fn test_navigate_only_from_main() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        let child = manager.open_child(&mut host, "https://other.test").unwrap();

        let reply = manager.dispatch(
            &mut host,
            &settings,
            main,
            RemoteCommand::Navigate("portal.test".into()),
        );
        assert_eq!(reply, CommandReply::Flag(true));
        assert_eq!(host.loads(main).last().copied(), Some("http://portal.test"));

        let reply = manager.dispatch(
            &mut host,
            &settings,
            child,
            RemoteCommand::Navigate("portal.test".into()),
        );
        assert_eq!(reply, CommandReply::Flag(false));
    }

    #[test]
    fn test_maximize_toggles_and_fullscreen_reports_state() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);

        manager.dispatch(&mut host, &settings, main, RemoteCommand::Maximize);
        assert!(host.surface(main).maximized);
        manager.dispatch(&mut host, &settings, main, RemoteCommand::Maximize);
        assert!(!host.surface(main).maximized);

        let on = manager.dispatch(&mut host, &settings, main, RemoteCommand::ToggleFullscreen);
        let off = manager.dispatch(&mut host, &settings, main, RemoteCommand::ToggleFullscreen);
        assert_eq!((on, off), (CommandReply::Flag(true), CommandReply::Flag(false)));
    }

    #[test]
    fn test_overlay_lifecycle() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);

        manager.dispatch(&mut host, &settings, main, RemoteCommand::ShowControls);
        let OverlayState::Shown(overlay) = manager.overlay() else {
            panic!("overlay should be shown");
        };
        assert_eq!(host.surface(overlay).bounds.x, (1680 - 200) / 2);
        assert_eq!(host.surface(overlay).bounds.y, (864 - 60) / 2);

        manager.on_focus_lost(&mut host, overlay);
        assert_eq!(manager.overlay(), OverlayState::Hidden(overlay));

        manager.toggle_overlay(&mut host);
        assert_eq!(manager.overlay(), OverlayState::Shown(overlay));
        manager.toggle_overlay(&mut host);
        assert_eq!(manager.overlay(), OverlayState::Hidden(overlay));
        assert_eq!(host.ids_with_role(SurfaceRole::Overlay).len(), 1);

        host.close(overlay).unwrap();
        manager.on_closed(&mut host, overlay);
        assert_eq!(manager.overlay(), OverlayState::Absent);
    }

    #[test]
    fn test_overlay_commands_act_on_main() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        manager.show_overlay(&mut host);
        let overlay = manager.overlay().surface().unwrap();

        let reply = manager.dispatch(&mut host, &settings, overlay, RemoteCommand::Minimize);
        assert_eq!(reply, CommandReply::Flag(true));
        assert!(host.calls.contains(&Call::Minimize(main)));
    }

    #[test]
    fn test_closing_main_cascades_to_overlay() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        manager.show_overlay(&mut host);
        let overlay = manager.overlay().surface().unwrap();
        let child = manager.open_child(&mut host, "https://x.test").unwrap();

        host.close(main).unwrap();
        manager.on_closed(&mut host, main);

        assert_eq!(manager.main(), None);
        assert_eq!(manager.overlay(), OverlayState::Absent);
        assert!(!host.is_alive(overlay));
        assert!(host.is_alive(child));
        assert_eq!(manager.children(), vec![child]);
    }

    #[test]
    fn test_children_inherit_captured_features() {
        let settings = Settings {
            hidden_features: HiddenFeatures::parse("home,mouse"),
            ..Default::default()
        };
        let (mut host, mut manager, _) = started(&settings);
        let child = manager.open_child(&mut host, "https://x.test").unwrap();
        assert_eq!(
            manager.controller_mut(child).unwrap().hidden(),
            &HiddenFeatures::parse("home,mouse")
        );
        assert_eq!(host.loads(child), vec!["https://x.test"]);
    }

    #[test]
    fn test_content_ready_runs_probe_then_injects() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);

        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::ContentReady);
        assert_eq!(reply, CommandReply::Flag(true));
        let ticket = host.last_completion(main).unwrap();

        let outcome = manager.on_script_completed(&mut host, main, ticket, Ok(json!(true)));
        assert_eq!(outcome, Some(InjectionOutcome::Injected));
        // Un second retour pour le même ticket est ignoré.
        assert_eq!(manager.on_script_completed(&mut host, main, ticket, Ok(json!(true))), None);
    }

    #[test]
    fn test_clear_cache_then_login() {
        let settings = Settings {
            start_url: Some("https://app.test".into()),
            ..Default::default()
        };
        let (mut host, mut manager, main) = started(&settings);
        let child = manager.open_child(&mut host, "https://x.test").unwrap();

        let reply = manager.dispatch(&mut host, &settings, child, RemoteCommand::ClearCache);
        assert_eq!(reply, CommandReply::Flag(true));
        let ticket = host.last_completion(main).unwrap();
        assert!(host.calls.contains(&Call::ClearStorage(main, ticket)));

        manager.on_storage_cleared(&mut host, ticket);
        assert_eq!(host.loads(main).last().copied(), Some(pages::login_page_url().as_str()));
    }

    #[test]
    fn test_get_config_applies_overrides_and_notifies_main() {
        let mut settings = Settings::default();
        settings.file.theme = Some("light".into());
        settings.file.extra.insert("customConfig".into(), json!("x"));
        let (mut host, mut manager, main) = started(&settings);

        manager.apply_overrides(
            &mut host,
            &settings,
            ConfigOverrides {
                theme: Some("dark".into()),
                hide: None,
            },
        );
        let last_script = host.scripts(main).last().copied().unwrap();
        assert!(last_script.contains("config-updated"));
        assert!(last_script.contains("\"theme\":\"dark\""));

        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::GetConfig);
        assert_eq!(
            reply.to_json(),
            json!({"theme": "dark", "customConfig": "x"})
        );
    }

    #[test]
    fn test_drag_start_notifies_sender() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::DragStart);
        assert_eq!(reply, CommandReply::None);
        assert!(host.scripts(main).last().unwrap().contains("window-dragging"));
    }

    #[test]
    fn test_teardown_requests_exit() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        manager.show_overlay(&mut host);
        manager.teardown(&mut host);
        assert!(host.exit_requested);
        assert!(!host.is_alive(main));
        assert_eq!(manager.main(), None);
    }

    #[test]
    fn test_closed_children_release_their_entries() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        for _ in 0..200 {
            let child = manager.open_child(&mut host, "https://x.test").unwrap();
            let reply = manager.dispatch(&mut host, &settings, child, RemoteCommand::Close);
            assert_eq!(reply, CommandReply::Flag(true));
            manager.on_closed(&mut host, child);
            // Un événement tardif pour une surface fermée ne répond plus rien.
            let reply = manager.dispatch(&mut host, &settings, child, RemoteCommand::Minimize);
            assert_eq!(reply, CommandReply::Flag(false));
        }
        assert_eq!(manager.surfaces.len(), 1);
        assert_eq!(manager.role_of(main), Some(SurfaceRole::Main));
        assert!(manager.children().is_empty());
    }

    #[test]
    fn test_closing_main_releases_overlay_entry() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        manager.show_overlay(&mut host);
        let overlay = manager.overlay().surface().unwrap();

        host.close(main).unwrap();
        manager.on_closed(&mut host, main);
        manager.on_closed(&mut host, overlay);

        assert!(manager.surfaces.is_empty());
        assert_eq!(manager.role_of(overlay), None);
    }

    #[test]
    fn test_creation_failures_leave_state_untouched() {
        let settings = Settings::default();
        let mut host = FakeHost::new();
        host.fail_creation = true;
        let mut manager = SurfaceLifecycleManager::new();

        assert_eq!(manager.create_main(&mut host, &settings), None);
        assert_eq!(manager.main(), None);
        assert_eq!(manager.open_child(&mut host, "https://x.test"), None);
        manager.show_overlay(&mut host);
        assert_eq!(manager.overlay(), OverlayState::Absent);
        assert!(manager.surfaces.is_empty());
        assert!(host.surfaces.is_empty());
    }

    #[test]
    fn test_content_ready_from_overlay_is_refused() {
        let settings = Settings::default();
        let (mut host, mut manager, _) = started(&settings);
        manager.show_overlay(&mut host);
        let overlay = manager.overlay().surface().unwrap();

        let reply = manager.dispatch(&mut host, &settings, overlay, RemoteCommand::ContentReady);
        assert_eq!(reply, CommandReply::Flag(false));
        assert!(manager.pending.is_empty());
        assert_eq!(host.last_completion(overlay), None);
    }

    #[test]
    fn test_content_ready_twice_keeps_answering_true() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        manager.dispatch(&mut host, &settings, main, RemoteCommand::ContentReady);
        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::ContentReady);
        assert_eq!(reply, CommandReply::Flag(true));
        assert_eq!(manager.pending.len(), 1);
    }

    #[test]
    fn test_clear_cache_without_storage_replies_false() {
        let settings = Settings::default();
        let (mut host, mut manager, main) = started(&settings);
        host.storage_unavailable = true;
        let loads_before = host.loads(main).len();

        let reply = manager.dispatch(&mut host, &settings, main, RemoteCommand::ClearCache);
        assert_eq!(reply, CommandReply::Flag(false));
        assert!(manager.pending.is_empty());
        assert!(!host.calls.iter().any(|c| matches!(c, Call::ClearStorage(..))));

        manager.on_storage_cleared(&mut host, Completion(1));
        assert_eq!(host.loads(main).len(), loads_before);
    }
}

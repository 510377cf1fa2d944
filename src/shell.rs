//! Point d'entrée unique des événements de l'hôte.
//!
//! [`KioskShell`] possède la configuration et le gestionnaire de surfaces.
//! L'hôte lui est prêté à chaque appel : côté winit, il n'existe que le
//! temps d'un callback de la boucle d'événements. Chaque [`HostEvent`]
//! passe par [`KioskShell::handle`], sur le thread de la boucle.

use serde_json::Value;
use tracing::{debug, warn};

use crate::bridge::{self, Inbound};
use crate::config::Settings;
use crate::host::{EventResponse, HostEvent, SurfaceHost};
use crate::lifecycle::SurfaceLifecycleManager;

pub struct KioskShell {
    settings: Settings,
    surfaces: SurfaceLifecycleManager,
}

impl KioskShell {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            surfaces: SurfaceLifecycleManager::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn surfaces(&self) -> &SurfaceLifecycleManager {
        &self.surfaces
    }

    pub fn handle(&mut self, host: &mut dyn SurfaceHost, event: HostEvent) -> EventResponse {
        let settings = &self.settings;
        let surfaces = &mut self.surfaces;

        match event {
            HostEvent::AppReady => {
                surfaces.apply_overrides(host, settings, settings.overrides());
                surfaces.create_main(host, settings);
            }
            HostEvent::Activate => {
                if surfaces.main().is_none() {
                    surfaces.create_main(host, settings);
                }
            }
            HostEvent::AllWindowsClosed => surfaces.teardown(host),

            HostEvent::NavigationStarted(id) => {
                if let Some(controller) = surfaces.controller_mut(id) {
                    controller.on_navigation_started();
                }
            }
            HostEvent::DocumentReady(id) => {
                if let Some(controller) = surfaces.controller_mut(id)
                    && let Err(e) = controller.on_document_ready(host)
                {
                    warn!(surface = %id, error = %e, "Document decoration failed");
                }
            }
            HostEvent::LoadFinished(id) | HostEvent::InPageNavigation(id) => {
                if let Some(controller) = surfaces.controller_mut(id)
                    && let Err(e) = controller.reapply_scrollbar(host)
                {
                    debug!(surface = %id, error = %e, "Scrollbar styles not applied");
                }
            }
            HostEvent::NavigationFailed {
                surface,
                code,
                description,
                url,
            } => {
                if let Some(controller) = surfaces.controller_mut(surface) {
                    controller.on_navigation_failed(host, code, &description, &url);
                }
            }
            HostEvent::ContextMenuRequested(_) => return EventResponse::Suppress,
            HostEvent::BeforeInput { surface, input } => {
                return match surfaces.controller_mut(surface) {
                    Some(controller) => controller.on_before_input(host, &input),
                    None => EventResponse::Continue,
                };
            }

            HostEvent::Message {
                surface,
                channel,
                data,
            } => {
                let reply = match bridge::parse_inbound(&channel, data.as_ref()) {
                    Ok(Inbound::Command(command)) => {
                        let channel = command.channel();
                        let one_way = command.is_one_way();
                        let reply = surfaces.dispatch(host, settings, surface, command);
                        if one_way {
                            Value::Null
                        } else {
                            if !reply.succeeded() {
                                debug!(%surface, channel, "Command had no effect");
                            }
                            reply.to_json()
                        }
                    }
                    Ok(Inbound::OpenWindow(url)) => {
                        Value::Bool(surfaces.open_child(host, &url).is_some())
                    }
                    Err(e) => {
                        warn!(%surface, error = %e, "Rejected bridge message");
                        Value::Bool(false)
                    }
                };
                return EventResponse::Reply(reply);
            }
            HostEvent::ScriptCompleted {
                surface,
                completion,
                result,
            } => {
                if let Some(outcome) =
                    surfaces.on_script_completed(host, surface, completion, result)
                {
                    debug!(%surface, ?outcome, "Injection step finished");
                }
            }
            HostEvent::StorageCleared { completion, .. } => {
                surfaces.on_storage_cleared(host, completion);
            }
            HostEvent::FocusLost(id) => surfaces.on_focus_lost(host, id),
            HostEvent::Closed(id) => surfaces.on_closed(host, id),
        }
        EventResponse::Continue
    }
}

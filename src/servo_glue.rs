//! Couche d'intégration entre Servo et le shell.
//!
//! Ce module contient trois éléments clés :
//!
//! 1. **[`Waker`] / [`WakerEvent`]** : le pont `Send + Sync` entre les threads
//!    internes de Servo et le thread principal Winit.
//!
//! 2. **[`EventQueue`]** : file des [`HostEvent`] produits pendant
//!    `servo.spin_event_loop()`. Les callbacks Servo n'ont qu'un `&self` ; ils
//!    empilent, et la boucle Winit dépile ensuite vers le shell.
//!
//! 3. **[`SurfaceDelegate`]** : un `WebViewDelegate` par surface. Il traduit
//!    les changements d'état de chargement et intercepte les appels du pont
//!    (`http://kioskshell.bridge/invoke/...`).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use http::StatusCode;
use http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue,
};
use serde_json::Value;
use servo::{LoadStatus, WebResourceLoad, WebResourceResponse, WebView, WebViewDelegate};
use tracing::{debug, trace, warn};
use url::Url;
use winit::event_loop::{EventLoop, EventLoopProxy};
use winit::window::Window;

use crate::bridge;
use crate::host::{EventResponse, HostEvent};
use crate::surface::SurfaceId;

// ─────────────────────────────────────────────────────────────────────────────
// Waker : pont Servo → Winit
// ─────────────────────────────────────────────────────────────────────────────

/// Événement marqueur envoyé à travers le `EventLoopProxy` de Winit.
///
/// La boucle Winit le reçoit dans `user_event()` et répond par
/// `servo.spin_event_loop()`.
#[derive(Debug)]
pub struct WakerEvent;

/// Réveille la boucle Winit depuis n'importe quel thread Servo.
///
/// `Clone + Send + Sync` comme l'exige `EventLoopWaker`.
#[derive(Clone)]
pub struct Waker(EventLoopProxy<WakerEvent>);

impl Waker {
    pub fn new(event_loop: &EventLoop<WakerEvent>) -> Self {
        Self(event_loop.create_proxy())
    }
}

impl embedder_traits::EventLoopWaker for Waker {
    fn clone_box(&self) -> Box<dyn embedder_traits::EventLoopWaker> {
        Box::new(Self(self.0.clone()))
    }

    fn wake(&self) {
        if let Err(error) = self.0.send_event(WakerEvent) {
            warn!(?error, "Échec du réveil de la boucle d'événements Winit");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File d'événements
// ─────────────────────────────────────────────────────────────────────────────

/// Événement en attente, avec la requête du pont à laquelle répondre le
/// cas échéant.
pub struct Queued {
    pub event: HostEvent,
    pub reply_to: Option<WebResourceLoad>,
}

/// File partagée entre les delegates et la boucle Winit (thread principal
/// uniquement).
#[derive(Clone, Default)]
pub struct EventQueue(Rc<RefCell<VecDeque<Queued>>>);

impl EventQueue {
    pub fn push(&self, event: HostEvent) {
        self.0.borrow_mut().push_back(Queued {
            event,
            reply_to: None,
        });
    }

    /// Appel du pont : la réponse du shell finira dans `load`.
    pub fn push_call(&self, event: HostEvent, load: WebResourceLoad) {
        self.0.borrow_mut().push_back(Queued {
            event,
            reply_to: Some(load),
        });
    }

    pub fn pop(&self) -> Option<Queued> {
        self.0.borrow_mut().pop_front()
    }
}

/// Répond à un appel du pont avec le corps JSON produit par le shell.
///
/// Les pages intégrées sont servies en `data:` (origine opaque) : la réponse
/// doit autoriser toute origine pour que `fetch` puisse la lire.
pub fn answer(load: WebResourceLoad, response: EventResponse) {
    let body = match response {
        EventResponse::Reply(value) => value,
        EventResponse::Continue | EventResponse::Suppress => Value::Null,
    };
    let url = load.request().url.clone();
    let mut intercepted = load.intercept(bridge_response(url, StatusCode::OK));
    intercepted.send_body_data(body.to_string().into_bytes());
    intercepted.finish();
}

fn bridge_response(url: Url, status: StatusCode) -> WebResourceResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    WebResourceResponse::new(url)
        .headers(headers)
        .status_code(status)
}

// ─────────────────────────────────────────────────────────────────────────────
// WebViewDelegate : callbacks Servo → shell (par surface)
// ─────────────────────────────────────────────────────────────────────────────

pub struct SurfaceDelegate {
    surface: SurfaceId,
    window: Rc<Window>,
    queue: EventQueue,
    /// Vrai entre `LoadStatus::Started` et `LoadStatus::Complete`.
    loading: Cell<bool>,
}

impl SurfaceDelegate {
    pub fn new(surface: SurfaceId, window: Rc<Window>, queue: EventQueue) -> Self {
        Self {
            surface,
            window,
            queue,
            loading: Cell::new(false),
        }
    }
}

impl WebViewDelegate for SurfaceDelegate {
    fn notify_new_frame_ready(&self, _webview: WebView) {
        self.window.request_redraw();
    }

    /// `HeadParsed` tient lieu de « DOM prêt » : `document.head` existe, les
    /// feuilles de style peuvent y être insérées.
    fn notify_load_status_changed(&self, _webview: WebView, status: LoadStatus) {
        let event = match status {
            LoadStatus::Started => {
                self.loading.set(true);
                HostEvent::NavigationStarted(self.surface)
            }
            LoadStatus::HeadParsed => HostEvent::DocumentReady(self.surface),
            LoadStatus::Complete => {
                self.loading.set(false);
                HostEvent::LoadFinished(self.surface)
            }
        };
        trace!(surface = %self.surface, ?status, "Load status");
        self.queue.push(event);
    }

    /// Hors chargement, un changement d'URL est une navigation interne
    /// (ancre, `history.pushState`).
    fn notify_url_changed(&self, _webview: WebView, url: Url) {
        if !self.loading.get() {
            debug!(surface = %self.surface, %url, "In-page navigation");
            self.queue.push(HostEvent::InPageNavigation(self.surface));
        }
    }

    fn notify_page_title_changed(&self, _webview: WebView, title: Option<String>) {
        if let Some(title) = title {
            self.window.set_title(&title);
        }
    }

    fn load_web_resource(&self, _webview: WebView, load: WebResourceLoad) {
        let url = load.request().url.clone();
        if !bridge::is_bridge_url(&url) {
            return;
        }
        match bridge::parse_invoke_url(&url) {
            Some((channel, data)) => {
                trace!(surface = %self.surface, %channel, "Bridge call");
                let event = HostEvent::Message {
                    surface: self.surface,
                    channel,
                    data,
                };
                self.queue.push_call(event, load);
            }
            None => {
                debug!(surface = %self.surface, %url, "Malformed bridge request");
                load.intercept(bridge_response(url, StatusCode::NOT_FOUND))
                    .finish();
            }
        }
    }
}

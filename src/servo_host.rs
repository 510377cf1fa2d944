//! Implémentation de [`SurfaceHost`] sur Servo + Winit.
//!
//! Une surface = une fenêtre Winit + son `WindowRenderingContext` + une
//! WebView. Toutes les WebViews partagent l'instance Servo et reçoivent le
//! script de pont via leur `UserContentManager`.
//!
//! [`WindowSet`] possède les fenêtres pour toute la vie de l'application ;
//! [`ServoHost`] n'est qu'un emprunt de la durée d'un callback Winit, le seul
//! moment où l'`ActiveEventLoop` (nécessaire pour créer une fenêtre) existe.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use euclid::Scale;
use serde_json::Value;
use servo::{
    JSValue, RenderingContext, Servo, UserContentManager, UserScript, WebView, WebViewBuilder,
    WindowRenderingContext,
};
use tracing::{debug, info, warn};
use url::Url;
use webrender_api::units::DevicePoint;
use winit::dpi::{LogicalPosition, LogicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId, WindowLevel};

use crate::bridge;
use crate::desktop;
use crate::host::{Completion, HostError, HostEvent, SurfaceHost};
use crate::rendering;
use crate::servo_glue::{EventQueue, SurfaceDelegate};
use crate::styles::StyleKey;
use crate::surface::{Bounds, SurfaceId, SurfaceRole, SurfaceSpec};

/// Une fenêtre vivante.
pub struct SurfaceWindow {
    pub role: SurfaceRole,
    pub window: Rc<Window>,
    pub rendering_context: Rc<WindowRenderingContext>,
    pub webview: WebView,
    /// Position du curseur en device pixels.
    pub cursor: Cell<DevicePoint>,
}

/// Toutes les surfaces, plus l'instance Servo qui les anime.
pub struct WindowSet {
    servo: Servo,
    queue: EventQueue,
    surfaces: BTreeMap<SurfaceId, SurfaceWindow>,
    by_window: HashMap<WindowId, SurfaceId>,
    next_id: u64,
}

impl WindowSet {
    pub fn new(servo: Servo) -> Self {
        Self {
            servo,
            queue: EventQueue::default(),
            surfaces: BTreeMap::new(),
            by_window: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn servo(&self) -> &Servo {
        &self.servo
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn surface_for(&self, window: WindowId) -> Option<SurfaceId> {
        self.by_window.get(&window).copied()
    }

    pub fn get(&self, surface: SurfaceId) -> Option<&SurfaceWindow> {
        self.surfaces.get(&surface)
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    fn live(&self, surface: SurfaceId) -> Result<&SurfaceWindow, HostError> {
        self.surfaces
            .get(&surface)
            .ok_or(HostError::SurfaceGone(surface))
    }
}

/// Hôte prêté au shell le temps d'un callback.
pub struct ServoHost<'a> {
    event_loop: &'a ActiveEventLoop,
    windows: &'a mut WindowSet,
}

impl<'a> ServoHost<'a> {
    pub fn new(event_loop: &'a ActiveEventLoop, windows: &'a mut WindowSet) -> Self {
        Self {
            event_loop,
            windows,
        }
    }

    fn window(&self, surface: SurfaceId) -> Result<&Window, HostError> {
        Ok(self.windows.live(surface)?.window.as_ref())
    }

    fn build_window(&self, spec: &SurfaceSpec) -> Result<SurfaceWindow, String> {
        let window = Rc::new(
            self.event_loop
                .create_window(window_attributes(spec))
                .map_err(|e| e.to_string())?,
        );
        let display_handle = self.event_loop.display_handle().map_err(|e| e.to_string())?;
        let window_handle = window.window_handle().map_err(|e| e.to_string())?;
        let rendering_context =
            rendering::create_rendering_context(display_handle, window_handle, window.inner_size())
                .map_err(|e| e.to_string())?;

        let id = SurfaceId(self.windows.next_id + 1);
        let delegate = Rc::new(SurfaceDelegate::new(
            id,
            window.clone(),
            self.windows.queue.clone(),
        ));
        let user_content_manager = Rc::new(UserContentManager::new(&self.windows.servo));
        let bridge_script = bridge::bridge_script();
        user_content_manager.add_script(Rc::new(UserScript::from(bridge_script.as_str())));

        let webview = WebViewBuilder::new(
            &self.windows.servo,
            rendering_context.clone() as Rc<dyn RenderingContext>,
        )
        .hidpi_scale_factor(Scale::new(window.scale_factor() as f32))
        .delegate(delegate)
        .user_content_manager(user_content_manager)
        .build();

        Ok(SurfaceWindow {
            role: spec.role,
            window,
            rendering_context,
            webview,
            cursor: Cell::new(DevicePoint::zero()),
        })
    }
}

impl SurfaceHost for ServoHost<'_> {
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError> {
        let surface = self.build_window(spec).map_err(|reason| HostError::Creation {
            role: spec.role,
            reason,
        })?;
        self.windows.next_id += 1;
        let id = SurfaceId(self.windows.next_id);
        self.windows.by_window.insert(surface.window.id(), id);
        self.windows.surfaces.insert(id, surface);
        info!(surface = %id, role = %spec.role, "Window created");
        Ok(id)
    }

    fn is_alive(&self, surface: SurfaceId) -> bool {
        self.windows.surfaces.contains_key(&surface)
    }

    fn load_url(&mut self, surface: SurfaceId, url: &str) -> Result<(), HostError> {
        let parsed = Url::parse(url).map_err(|_| HostError::InvalidUrl(url.to_string()))?;
        self.windows.live(surface)?.webview.load(parsed);
        Ok(())
    }

    fn execute_script(
        &mut self,
        surface: SurfaceId,
        script: &str,
        completion: Option<Completion>,
    ) -> Result<(), HostError> {
        let target = self.windows.live(surface)?;
        let queue = self.windows.queue.clone();
        target.webview.evaluate_javascript(script, move |result| {
            let Some(completion) = completion else {
                if let Err(e) = result {
                    debug!(%surface, error = ?e, "Script failed");
                }
                return;
            };
            let result = result.map(json_from_js).map_err(|e| format!("{e:?}"));
            queue.push(HostEvent::ScriptCompleted {
                surface,
                completion,
                result,
            });
        });
        Ok(())
    }

    fn insert_css(
        &mut self,
        surface: SurfaceId,
        key: StyleKey,
        css: &str,
    ) -> Result<(), HostError> {
        self.execute_script(surface, &style_script(key, css), None)
    }

    fn minimize(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        self.window(surface)?.set_minimized(true);
        Ok(())
    }

    fn is_maximized(&self, surface: SurfaceId) -> Result<bool, HostError> {
        Ok(self.window(surface)?.is_maximized())
    }

    fn set_maximized(&mut self, surface: SurfaceId, maximized: bool) -> Result<(), HostError> {
        self.window(surface)?.set_maximized(maximized);
        Ok(())
    }

    fn is_fullscreen(&self, surface: SurfaceId) -> Result<bool, HostError> {
        Ok(self.window(surface)?.fullscreen().is_some())
    }

    fn set_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool) -> Result<(), HostError> {
        self.window(surface)?
            .set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
        Ok(())
    }

    fn close(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        let closed = self
            .windows
            .surfaces
            .remove(&surface)
            .ok_or(HostError::SurfaceGone(surface))?;
        self.windows.by_window.remove(&closed.window.id());
        // WebView puis fenêtre native libérées ici.
        drop(closed);

        self.windows.queue.push(HostEvent::Closed(surface));
        if self.windows.surfaces.is_empty() {
            self.windows.queue.push(HostEvent::AllWindowsClosed);
        }
        Ok(())
    }

    fn show(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        let window = self.window(surface)?;
        window.set_visible(true);
        window.focus_window();
        Ok(())
    }

    fn hide(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        self.window(surface)?.set_visible(false);
        Ok(())
    }

    fn bounds(&self, surface: SurfaceId) -> Result<Bounds, HostError> {
        let window = self.window(surface)?;
        let scale = window.scale_factor();
        let position: LogicalPosition<i32> = window
            .outer_position()
            .map(|p| p.to_logical(scale))
            .unwrap_or(LogicalPosition::new(0, 0));
        let size: LogicalSize<u32> = window.outer_size().to_logical(scale);
        Ok(Bounds {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        })
    }

    fn set_position(&mut self, surface: SurfaceId, x: i32, y: i32) -> Result<(), HostError> {
        self.window(surface)?
            .set_outer_position(LogicalPosition::new(x, y));
        Ok(())
    }

    fn clear_storage(
        &mut self,
        surface: SurfaceId,
        completion: Completion,
    ) -> Result<(), HostError> {
        let target = self.windows.live(surface)?;
        // Servo n'expose pas le stockage de session à l'embedder : le script
        // ne vide que ce que l'origine du document courant possède.
        if !target.webview.url().as_ref().is_some_and(has_storage_origin) {
            return Err(HostError::StorageUnavailable(surface));
        }
        let queue = self.windows.queue.clone();
        target
            .webview
            .evaluate_javascript(CLEAR_STORAGE_SCRIPT, move |result| {
                match result.map(json_from_js) {
                    Ok(Value::Array(cleared)) if !cleared.is_empty() => {
                        info!(%surface, ?cleared, "Storage cleared");
                    }
                    Ok(other) => warn!(%surface, result = %other, "Nothing was cleared"),
                    Err(e) => warn!(%surface, error = ?e, "Storage clearing script failed"),
                }
                queue.push(HostEvent::StorageCleared {
                    surface,
                    completion,
                });
            });
        Ok(())
    }

    fn open_external(&mut self, path: &Path) -> Result<(), HostError> {
        desktop::open_path(path).map_err(|source| HostError::OpenExternal {
            path: path.to_path_buf(),
            source,
        })
    }

    fn request_exit(&mut self) {
        self.event_loop.exit();
    }
}

fn window_attributes(spec: &SurfaceSpec) -> WindowAttributes {
    let mut attributes = Window::default_attributes()
        .with_title(spec.title)
        .with_inner_size(LogicalSize::new(f64::from(spec.width), f64::from(spec.height)))
        .with_decorations(!spec.frameless)
        .with_transparent(spec.transparent)
        .with_resizable(spec.resizable);
    if spec.always_on_top {
        attributes = attributes.with_window_level(WindowLevel::AlwaysOnTop);
    }
    if spec.fullscreen {
        attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::WindowAttributesExtWindows;
        attributes = attributes.with_skip_taskbar(spec.skip_taskbar);
    }
    attributes
}

/// Remplace (ou crée) la feuille `<style id=…>` de la clé.
fn style_script(key: StyleKey, css: &str) -> String {
    format!(
        "(function () {{\n  const id = {id};\n  let style = document.getElementById(id);\n  if (!style) {{\n    style = document.createElement('style');\n    style.id = id;\n    (document.head || document.documentElement).appendChild(style);\n  }}\n  style.textContent = {css};\n}})();",
        id = Value::String(key.element_id().to_string()),
        css = Value::String(css.to_string()),
    )
}

/// Vrai si le document a une origine (schéma, hôte, port) à qui appartient
/// un stockage ; `data:`, `about:` et `file:` sont opaques.
fn has_storage_origin(url: &Url) -> bool {
    url.origin().is_tuple()
}

/// Vide le stockage de l'origine courante et renvoie les catégories
/// effectivement vidées. Caches et bases IndexedDB sont supprimés en
/// arrière-plan.
const CLEAR_STORAGE_SCRIPT: &str = r#"(function () {
  const cleared = [];
  try { localStorage.clear(); cleared.push('localStorage'); } catch (e) {}
  try { sessionStorage.clear(); cleared.push('sessionStorage'); } catch (e) {}
  try {
    document.cookie.split(';').forEach((c) => {
      const name = c.split('=')[0].trim();
      if (name) { document.cookie = name + '=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/'; }
    });
    cleared.push('cookies');
  } catch (e) {}
  try {
    if (window.caches) {
      caches.keys().then((keys) => keys.forEach((k) => caches.delete(k)));
      cleared.push('caches');
    }
  } catch (e) {}
  try {
    if (window.indexedDB && indexedDB.databases) {
      indexedDB.databases().then((dbs) => dbs.forEach((db) => indexedDB.deleteDatabase(db.name)));
      cleared.push('indexedDB');
    }
  } catch (e) {}
  return cleared;
})();"#;

fn json_from_js(value: JSValue) -> Value {
    match value {
        JSValue::Boolean(b) => Value::Bool(b),
        JSValue::Number(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        JSValue::String(s) => Value::String(s),
        JSValue::Array(items) => Value::Array(items.into_iter().map(json_from_js).collect()),
        JSValue::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, json_from_js(value)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

//! Hôte factice pour les tests unitaires : enregistre chaque appel et
//! simule l'état des fenêtres.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use url::Url;

use crate::host::{Completion, HostError, SurfaceHost};
use crate::styles::StyleKey;
use crate::surface::{Bounds, SurfaceId, SurfaceRole, SurfaceSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(SurfaceId, SurfaceRole),
    Load(SurfaceId, String),
    Script(SurfaceId, String, Option<Completion>),
    Css(SurfaceId, StyleKey, String),
    Minimize(SurfaceId),
    SetMaximized(SurfaceId, bool),
    SetFullscreen(SurfaceId, bool),
    Close(SurfaceId),
    Show(SurfaceId),
    Hide(SurfaceId),
    SetPosition(SurfaceId, i32, i32),
    ClearStorage(SurfaceId, Completion),
    OpenExternal(PathBuf),
    Exit,
}

#[derive(Debug, Clone)]
pub struct FakeSurface {
    pub spec: SurfaceSpec,
    pub alive: bool,
    pub maximized: bool,
    pub fullscreen: bool,
    pub visible: bool,
    pub bounds: Bounds,
    /// Feuilles de style actives, une par clé.
    pub styles: BTreeMap<StyleKey, String>,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    next_id: u64,
    pub surfaces: BTreeMap<SurfaceId, FakeSurface>,
    pub calls: Vec<Call>,
    pub fail_creation: bool,
    /// Simule un document sans origine propre (`data:`, `about:`).
    pub storage_unavailable: bool,
    pub exit_requested: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self, id: SurfaceId) -> &FakeSurface {
        &self.surfaces[&id]
    }

    pub fn ids_with_role(&self, role: SurfaceRole) -> Vec<SurfaceId> {
        self.surfaces
            .iter()
            .filter(|(_, s)| s.spec.role == role)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn loads(&self, id: SurfaceId) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Load(s, url) if *s == id => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn scripts(&self, id: SurfaceId) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Script(s, script, _) if *s == id => Some(script.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Ticket du dernier script lancé avec attente de résultat.
    pub fn last_completion(&self, id: SurfaceId) -> Option<Completion> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Script(s, _, Some(ticket)) if *s == id => Some(*ticket),
            Call::ClearStorage(s, ticket) if *s == id => Some(*ticket),
            _ => None,
        })
    }

    fn live(&self, id: SurfaceId) -> Result<&FakeSurface, HostError> {
        self.surfaces
            .get(&id)
            .filter(|s| s.alive)
            .ok_or(HostError::SurfaceGone(id))
    }

    fn live_mut(&mut self, id: SurfaceId) -> Result<&mut FakeSurface, HostError> {
        self.surfaces
            .get_mut(&id)
            .filter(|s| s.alive)
            .ok_or(HostError::SurfaceGone(id))
    }
}

impl SurfaceHost for FakeHost {
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError> {
        if self.fail_creation {
            return Err(HostError::Creation {
                role: spec.role,
                reason: "creation disabled".into(),
            });
        }
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.surfaces.insert(
            id,
            FakeSurface {
                spec: spec.clone(),
                alive: true,
                maximized: false,
                fullscreen: spec.fullscreen,
                visible: true,
                bounds: Bounds {
                    x: 0,
                    y: 0,
                    width: spec.width,
                    height: spec.height,
                },
                styles: BTreeMap::new(),
            },
        );
        self.calls.push(Call::Create(id, spec.role));
        Ok(id)
    }

    fn is_alive(&self, surface: SurfaceId) -> bool {
        self.live(surface).is_ok()
    }

    fn load_url(&mut self, surface: SurfaceId, url: &str) -> Result<(), HostError> {
        self.live(surface)?;
        Url::parse(url).map_err(|_| HostError::InvalidUrl(url.to_string()))?;
        self.calls.push(Call::Load(surface, url.to_string()));
        Ok(())
    }

    fn execute_script(
        &mut self,
        surface: SurfaceId,
        script: &str,
        completion: Option<Completion>,
    ) -> Result<(), HostError> {
        self.live(surface)?;
        self.calls
            .push(Call::Script(surface, script.to_string(), completion));
        Ok(())
    }

    fn insert_css(
        &mut self,
        surface: SurfaceId,
        key: StyleKey,
        css: &str,
    ) -> Result<(), HostError> {
        self.live_mut(surface)?.styles.insert(key, css.to_string());
        self.calls.push(Call::Css(surface, key, css.to_string()));
        Ok(())
    }

    fn minimize(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        self.live(surface)?;
        self.calls.push(Call::Minimize(surface));
        Ok(())
    }

    fn is_maximized(&self, surface: SurfaceId) -> Result<bool, HostError> {
        Ok(self.live(surface)?.maximized)
    }

    fn set_maximized(&mut self, surface: SurfaceId, maximized: bool) -> Result<(), HostError> {
        self.live_mut(surface)?.maximized = maximized;
        self.calls.push(Call::SetMaximized(surface, maximized));
        Ok(())
    }

    fn is_fullscreen(&self, surface: SurfaceId) -> Result<bool, HostError> {
        Ok(self.live(surface)?.fullscreen)
    }

    fn set_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool) -> Result<(), HostError> {
        self.live_mut(surface)?.fullscreen = fullscreen;
        self.calls.push(Call::SetFullscreen(surface, fullscreen));
        Ok(())
    }

    fn close(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        self.live_mut(surface)?.alive = false;
        self.calls.push(Call::Close(surface));
        Ok(())
    }

    fn show(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        self.live_mut(surface)?.visible = true;
        self.calls.push(Call::Show(surface));
        Ok(())
    }

    fn hide(&mut self, surface: SurfaceId) -> Result<(), HostError> {
        self.live_mut(surface)?.visible = false;
        self.calls.push(Call::Hide(surface));
        Ok(())
    }

    fn bounds(&self, surface: SurfaceId) -> Result<Bounds, HostError> {
        Ok(self.live(surface)?.bounds)
    }

    fn set_position(&mut self, surface: SurfaceId, x: i32, y: i32) -> Result<(), HostError> {
        let s = self.live_mut(surface)?;
        s.bounds.x = x;
        s.bounds.y = y;
        self.calls.push(Call::SetPosition(surface, x, y));
        Ok(())
    }

    fn clear_storage(
        &mut self,
        surface: SurfaceId,
        completion: Completion,
    ) -> Result<(), HostError> {
        self.live(surface)?;
        if self.storage_unavailable {
            return Err(HostError::StorageUnavailable(surface));
        }
        self.calls.push(Call::ClearStorage(surface, completion));
        Ok(())
    }

    fn open_external(&mut self, path: &Path) -> Result<(), HostError> {
        self.calls.push(Call::OpenExternal(path.to_path_buf()));
        Ok(())
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
        self.calls.push(Call::Exit);
    }
}

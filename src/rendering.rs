//! Factory pour le contexte de rendu GPU.
//!
//! Chaque surface possède sa propre fenêtre Winit et donc son propre
//! `WindowRenderingContext` (surfman/OpenGL) ; l'instance Servo est
//! partagée.

use std::rc::Rc;

use servo::{RenderingContext, WindowRenderingContext};
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::raw_window_handle::{DisplayHandle, WindowHandle};

#[derive(Debug, Error)]
pub enum RenderingError {
    #[error("cannot create the window rendering context: {0}")]
    Context(String),
    #[error("cannot make the GL context current: {0}")]
    MakeCurrent(String),
}

/// Crée un contexte de rendu hardware-accéléré lié à une fenêtre Winit.
///
/// Le contexte est rendu courant (`make_current`) avant d'être retourné,
/// ce qui est requis avant de le passer à `WebViewBuilder`.
pub fn create_rendering_context(
    display_handle: DisplayHandle<'_>,
    window_handle: WindowHandle<'_>,
    size: PhysicalSize<u32>,
) -> Result<Rc<WindowRenderingContext>, RenderingError> {
    let rendering_context = WindowRenderingContext::new(display_handle, window_handle, size)
        .map_err(|e| RenderingError::Context(format!("{e:?}")))?;

    rendering_context
        .make_current()
        .map_err(|e| RenderingError::MakeCurrent(format!("{e:?}")))?;

    Ok(Rc::new(rendering_context))
}

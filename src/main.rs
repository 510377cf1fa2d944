//! Point d'entrée de KioskShell.
//!
//! Usage :
//!   kioskshell [-link=<url>] [-mode=fullscreen] [-window=top] [-page=single]
//!              [-hide=mouse,scroll,...] [-bg=<image>] [-theme=<nom>]
//!
//! `config.json` est cherché via `KIOSKSHELL_CONFIG`, puis dans le dossier
//! courant, puis à côté de l'exécutable. Une valeur non vide du fichier
//! l'emporte sur le flag correspondant.

use std::env;
use std::error::Error;

use tracing_subscriber::EnvFilter;
use winit::event_loop::EventLoop;

use kioskshell::browser::App;
use kioskshell::config::Settings;

fn main() -> Result<(), Box<dyn Error>> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| "cannot install the rustls crypto provider")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kioskshell=info")),
        )
        .init();

    #[cfg(debug_assertions)]
    tracing::warn!("Running in DEBUG mode, pages will load very slowly");

    kioskshell::resources::init()?;

    let argv: Vec<String> = env::args().collect();
    let settings = Settings::load(&argv, true);

    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, settings);

    Ok(event_loop.run_app(&mut app)?)
}

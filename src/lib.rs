//! # KioskShell — Shell kiosque plein écran
//!
//! Affiche une application web dans une fenêtre sans cadre, injecte un
//! panneau de contrôle flottant dans chaque page et expose au contenu une
//! petite API (`window.kioskAPI`) pour piloter les fenêtres.
//!
//! ## Architecture des modules
//!
//! Cœur, indépendant du moteur :
//!
//! - [`config`] : fichier `config.json`, drapeaux `-nom=valeur`, réglages
//!   résolus.
//! - [`bridge`] : protocole contenu ↔ hôte (canaux, enveloppes `postMessage`,
//!   script `window.kioskAPI`).
//! - [`styles`], [`inject`], [`pages`] : CSS, panneau de contrôle et pages
//!   intégrées (accueil, erreur, Overlay).
//! - [`surface`], [`input`] : rôles des fenêtres et filtrage clavier.
//! - [`host`] : trait [`host::SurfaceHost`] et événements remontés par la
//!   boîte à outils.
//! - [`controller`], [`lifecycle`], [`shell`] : décoration par surface,
//!   cycle de vie Main / Child / Overlay et routage des événements.
//! - [`desktop`] : ouverture de chemins avec l'application du système.
//!
//! Hôte Servo + Winit (feature `servo-host`) :
//!
//! - [`browser`] : boucle d'événements Winit, pattern "Two-Phase App".
//! - [`servo_glue`] : `Waker` et delegates Servo qui remontent les
//!   [`host::HostEvent`].
//! - [`servo_host`] : implémentation de [`host::SurfaceHost`] sur des
//!   fenêtres Winit portant chacune une WebView.
//! - [`rendering`], [`resources`], [`keyutils`] : contexte GL, ressources
//!   Servo, conversion clavier.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod desktop;
pub mod host;
pub mod inject;
pub mod input;
pub mod lifecycle;
pub mod pages;
pub mod shell;
pub mod styles;
pub mod surface;

#[cfg(feature = "servo-host")]
pub mod browser;
#[cfg(feature = "servo-host")]
pub mod keyutils;
#[cfg(feature = "servo-host")]
pub mod rendering;
#[cfg(feature = "servo-host")]
pub mod resources;
#[cfg(feature = "servo-host")]
pub mod servo_glue;
#[cfg(feature = "servo-host")]
pub mod servo_host;

#[cfg(test)]
mod testing;

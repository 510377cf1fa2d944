//! Feuilles de style injectées dans les surfaces.
//!
//! Chaque feuille est insérée sous une clé stable (voir [`StyleKey`]) : une
//! seconde insertion avec la même clé remplace la première au lieu de
//! s'empiler.

use crate::config::HiddenFeatures;

/// Clés des feuilles de style insérées dans une surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleKey {
    /// Sélection désactivée + zone de glissement (surface principale).
    Base,
    /// Variante stricte des fenêtres enfants.
    NewWindow,
    /// Barre de défilement (fine ou masquée).
    Scrollbar,
    /// Styles livrés avec le panneau de contrôle injecté.
    Controls,
}

impl StyleKey {
    /// Identifiant DOM de l'élément `<style>` porteur.
    pub fn element_id(self) -> &'static str {
        match self {
            Self::Base => "kioskshell-style-base",
            Self::NewWindow => "kioskshell-style-new-window",
            Self::Scrollbar => "kioskshell-style-scrollbar",
            Self::Controls => "kioskshell-style-controls",
        }
    }
}

pub const CUSTOM_SCROLLBAR_CSS: &str = r#"
::-webkit-scrollbar { width: 4px; height: 4px; }
::-webkit-scrollbar-track { background: transparent; border-radius: 10px; }
::-webkit-scrollbar-thumb {
  background: rgba(0, 0, 0, 0.15);
  border-radius: 10px;
  transition: all 0.3s ease;
}
::-webkit-scrollbar-thumb:hover { background: rgba(0, 0, 0, 0.25); }
* { scrollbar-width: thin; scrollbar-color: rgba(0, 0, 0, 0.15) transparent; }
.scroll-container::-webkit-scrollbar-thumb { background: rgba(0, 0, 0, 0.05); }
.scroll-container:hover::-webkit-scrollbar-thumb { background: rgba(0, 0, 0, 0.15); }
"#;

pub const HIDDEN_SCROLLBAR_CSS: &str = r#"
::-webkit-scrollbar { width: 0 !important; height: 0 !important; display: none; }
* { scrollbar-width: none !important; -ms-overflow-style: none; }
"#;

pub const HIDDEN_MOUSE_CSS: &str = r#"
*, *::before, *::after { cursor: none !important; }
"#;

pub const DISABLE_SELECTION_CSS: &str = r#"
.disable-select {
  -webkit-user-select: none;
  user-select: none;
  cursor: default;
}
.disable-select input,
.disable-select textarea,
.disable-select [contenteditable="true"] {
  -webkit-user-select: text !important;
  user-select: text !important;
  cursor: text !important;
}
.disable-select ::selection { background: transparent; }
"#;

pub const DRAG_REGION_CSS: &str = r#"
.drag-region {
  position: fixed;
  top: 0;
  left: 0;
  right: 0;
  height: 5px;
  -webkit-app-region: drag;
  z-index: 999999;
  opacity: 0;
  background-color: rgba(255, 255, 255, 0.1);
  transition: height 0.3s ease, opacity 0.3s ease;
  pointer-events: auto;
}
"#;

pub const CONTROL_PANEL_CSS: &str = r#"
.no-select { -webkit-user-select: none; user-select: none; cursor: default; }
"#;

const NEW_WINDOW_SELECTION_CSS: &str = r#"
body {
  margin: 0;
  padding: 0;
  overflow: hidden;
  -webkit-user-select: none;
  user-select: none;
  cursor: default;
}
* { -webkit-user-select: none; user-select: none; }
input, textarea, [contenteditable="true"] {
  -webkit-user-select: text !important;
  user-select: text !important;
  cursor: text !important;
}
::selection { background: transparent; }
"#;

/// Barre de défilement selon `hide=scroll`.
pub fn scrollbar_css(hidden: &HiddenFeatures) -> &'static str {
    if hidden.contains("scroll") {
        HIDDEN_SCROLLBAR_CSS
    } else {
        CUSTOM_SCROLLBAR_CSS
    }
}

/// Styles de base de la surface principale : sélection, zone de glissement
/// et barre de défilement, plus le curseur masqué si `hide=mouse`.
pub fn base_css(hidden: &HiddenFeatures) -> String {
    let mut css = String::with_capacity(2048);
    css.push_str(DISABLE_SELECTION_CSS);
    css.push_str(DRAG_REGION_CSS);
    css.push_str(scrollbar_css(hidden));
    if hidden.contains("mouse") {
        css.push_str(HIDDEN_MOUSE_CSS);
    }
    css
}

/// Variante « nouvelle fenêtre » : sélection bloquée partout sauf dans les
/// champs éditables.
pub fn new_window_css(hidden: &HiddenFeatures) -> String {
    let mut css = String::with_capacity(2048);
    css.push_str(NEW_WINDOW_SELECTION_CSS);
    css.push_str(DRAG_REGION_CSS);
    if hidden.contains("mouse") {
        css.push_str(HIDDEN_MOUSE_CSS);
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrollbar_variant_follows_hide_scroll() {
        assert_eq!(scrollbar_css(&HiddenFeatures::default()), CUSTOM_SCROLLBAR_CSS);
        assert_eq!(scrollbar_css(&HiddenFeatures::parse("scroll")), HIDDEN_SCROLLBAR_CSS);
    }

    #[test]
    fn test_base_css_carries_drag_region_and_mouse_rule() {
        let plain = base_css(&HiddenFeatures::default());
        assert!(plain.contains(".drag-region"));
        assert!(plain.contains(".disable-select"));
        assert!(!plain.contains("cursor: none"));

        let no_mouse = base_css(&HiddenFeatures::parse("mouse"));
        assert!(no_mouse.contains("cursor: none"));
    }

    #[test]
    fn test_new_window_css_allows_editable_selection() {
        let css = new_window_css(&HiddenFeatures::default());
        assert!(css.contains("input, textarea, [contenteditable=\"true\"]"));
        assert!(css.contains(".drag-region"));
    }

    #[test]
    fn test_style_keys_are_distinct() {
        let ids = [
            StyleKey::Base.element_id(),
            StyleKey::NewWindow.element_id(),
            StyleKey::Scrollbar.element_id(),
            StyleKey::Controls.element_id(),
        ];
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}

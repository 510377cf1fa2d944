//! Filtrage clavier au niveau hôte, avant que la touche n'atteigne la page.

use crate::surface::SurfaceRole;

/// Touche normalisée, indépendante de la boîte à outils fenêtrée.
///
/// `key` suit les valeurs W3C `KeyboardEvent.key` (`"F4"`, `"i"`, `"Alt"`…).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub pressed: bool,
    pub repeat: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyInput {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pressed: true,
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Comparaison de `key`, insensible à la casse.
    pub fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDecision {
    /// La touche continue vers la page.
    Forward,
    /// La touche est avalée.
    Suppress,
    /// Avalée, et le panneau injecté doit basculer.
    TogglePanel,
}

/// Décide du sort d'une touche pour une surface de rôle `role`.
pub fn decide(role: SurfaceRole, input: &KeyInput) -> InputDecision {
    if input.alt && input.is("F4") {
        return InputDecision::Suppress;
    }

    if role.is_child() && input.ctrl && input.shift && input.alt {
        if input.pressed && !input.repeat {
            return InputDecision::TogglePanel;
        }
        return InputDecision::Suppress;
    }

    // Outils de développement
    if input.is("F12") {
        return InputDecision::Suppress;
    }
    if (input.ctrl || input.meta) && input.shift && !input.alt && (input.is("i") || input.is("j")) {
        return InputDecision::Suppress;
    }

    InputDecision::Forward
}

//! Conversion des événements clavier Winit.
//!
//! Deux cibles :
//!
//! - [`KeyInput`], la forme neutre lue par le filtrage clavier du shell ;
//! - `KeyboardEvent` de Servo (types `keyboard_types` ré-exportés par
//!   `servo::`), pour les touches qui passent le filtre.
//!
//! Les noms de `winit::keyboard::NamedKey` et `KeyCode` reprennent ceux de
//! la spécification UI Events : leur forme `Debug` est donc aussi le nom
//! W3C, que `keyboard_types` sait relire.

use servo::{Code, Key, KeyState, KeyboardEvent, Location, Modifiers, NamedKey};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{
    Key as WinitKey, KeyLocation as WinitKeyLocation, ModifiersState, PhysicalKey,
};

use crate::input::KeyInput;

/// Forme neutre d'une touche, pour [`crate::input::decide`].
pub fn key_input_from_winit(key_event: &KeyEvent, mods: ModifiersState) -> KeyInput {
    KeyInput {
        key: key_name(&key_event.logical_key),
        pressed: key_event.state == ElementState::Pressed,
        repeat: key_event.repeat,
        ctrl: mods.control_key(),
        shift: mods.shift_key(),
        alt: mods.alt_key(),
        meta: mods.super_key(),
    }
}

/// Convertit un `KeyEvent` Winit + état des modificateurs en `KeyboardEvent` Servo.
pub fn keyboard_event_from_winit(key_event: &KeyEvent, mods: ModifiersState) -> KeyboardEvent {
    KeyboardEvent::new_without_event(
        key_state_from_winit(key_event.state),
        key_from_winit(&key_event.logical_key),
        code_from_winit(&key_event.physical_key),
        location_from_winit(key_event.location),
        modifiers_from_winit(mods),
        key_event.repeat,
        false,
    )
}

/// Valeur W3C `KeyboardEvent.key`.
fn key_name(logical_key: &WinitKey) -> String {
    match logical_key {
        WinitKey::Character(c) => c.to_string(),
        WinitKey::Named(named) => format!("{named:?}"),
        WinitKey::Unidentified(_) | WinitKey::Dead(_) => "Unidentified".to_string(),
    }
}

fn key_state_from_winit(state: ElementState) -> KeyState {
    match state {
        ElementState::Pressed => KeyState::Down,
        ElementState::Released => KeyState::Up,
    }
}

fn key_from_winit(logical_key: &WinitKey) -> Key {
    match logical_key {
        WinitKey::Character(c) => Key::Character(c.to_string()),
        WinitKey::Named(_) => key_name(logical_key)
            .parse::<NamedKey>()
            .map(Key::Named)
            .unwrap_or(Key::Named(NamedKey::Unidentified)),
        WinitKey::Unidentified(_) | WinitKey::Dead(_) => Key::Named(NamedKey::Unidentified),
    }
}

fn code_from_winit(physical_key: &PhysicalKey) -> Code {
    match physical_key {
        PhysicalKey::Code(key_code) => format!("{key_code:?}")
            .parse::<Code>()
            .unwrap_or(Code::Unidentified),
        PhysicalKey::Unidentified(_) => Code::Unidentified,
    }
}

fn location_from_winit(location: WinitKeyLocation) -> Location {
    match location {
        WinitKeyLocation::Left => Location::Left,
        WinitKeyLocation::Numpad => Location::Numpad,
        WinitKeyLocation::Right => Location::Right,
        WinitKeyLocation::Standard => Location::Standard,
    }
}

fn modifiers_from_winit(mods: ModifiersState) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::CONTROL, mods.control_key());
    modifiers.set(Modifiers::SHIFT, mods.shift_key());
    modifiers.set(Modifiers::ALT, mods.alt_key());
    modifiers.set(Modifiers::META, mods.super_key());
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::{KeyCode, NamedKey as WinitNamedKey, SmolStr};

    #[test]
    fn test_key_state_mapping() {
        assert_eq!(key_state_from_winit(ElementState::Pressed), KeyState::Down);
        assert_eq!(key_state_from_winit(ElementState::Released), KeyState::Up);
    }

    #[test]
    fn test_named_keys_use_w3c_names() {
        assert_eq!(key_name(&WinitKey::Named(WinitNamedKey::F4)), "F4");
        assert_eq!(key_name(&WinitKey::Named(WinitNamedKey::F12)), "F12");
        assert_eq!(key_name(&WinitKey::Named(WinitNamedKey::ArrowLeft)), "ArrowLeft");
        assert_eq!(key_name(&WinitKey::Character(SmolStr::new("I"))), "I");
    }

    #[test]
    fn test_servo_key_conversion() {
        assert_eq!(
            key_from_winit(&WinitKey::Named(WinitNamedKey::Enter)),
            Key::Named(NamedKey::Enter)
        );
        assert_eq!(
            key_from_winit(&WinitKey::Character(SmolStr::new("a"))),
            Key::Character("a".to_string())
        );
    }

    #[test]
    fn test_code_conversion() {
        assert_eq!(code_from_winit(&PhysicalKey::Code(KeyCode::KeyA)), Code::KeyA);
        assert_eq!(code_from_winit(&PhysicalKey::Code(KeyCode::F4)), Code::F4);
    }

    #[test]
    fn test_modifiers_mapping() {
        let mods = modifiers_from_winit(ModifiersState::CONTROL | ModifiersState::ALT);
        assert!(mods.contains(Modifiers::CONTROL));
        assert!(mods.contains(Modifiers::ALT));
        assert!(!mods.contains(Modifiers::SHIFT));
    }
}

//! PC keyboard scancode decoding
//!
//! Set-1 framing (the `0xE0` extension prefix, break code = make code |
//! `0x80`) is done by `pc_keyboard`. On top of its key events this module
//! applies the console's own rules: the four US translation tables, the
//! Alt+F1..F8 terminal switch, the Ctrl remap and the cursor key forms.

use bitflags::bitflags;
use pc_keyboard::{KeyCode, KeyState, ScancodeSet, ScancodeSet1};

/// One past the highest scancode with a table entry
pub const SCANCODE_MAX: u8 = 0x57;

const EXTENDED_PREFIX: u8 = 0xe0;

bitflags! {
    /// Held (or latched) modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT     = 0b0001;
        const CTRL      = 0b0010;
        const ALT       = 0b0100;
        const CAPS_LOCK = 0b1000;
    }
}

/// Modifier state plus the pending `0xE0` prefix
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub mods: Modifiers,
    pub extended_pending: bool,
}

/// Result of decoding one scancode byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// Bytes to feed into the line discipline
    Input(KeyBytes),
    /// Alt+Fn: focus the given virtual terminal
    SwitchSlot(usize),
}

/// Up to four bytes produced by a single key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBytes {
    buf: [u8; 4],
    len: u8,
}

impl KeyBytes {
    fn byte(b: u8) -> Self {
        Self { buf: [b, 0, 0, 0], len: 1 }
    }

    fn seq(bytes: &[u8]) -> Self {
        let mut buf = [0; 4];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self { buf, len: bytes.len() as u8 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

/// Translation tables for the US layout, `[caps_lock][shift]`
static KEYMAP: [[[u8; SCANCODE_MAX as usize]; 2]; 2] = [
    [
        table(b"\x00\x1b1234567890-=\x08\tqwertyuiop[]\n\x00asdfghjkl;'`\x00\\zxcvbnm,./\x00\x00\x00 "),
        table(b"\x00\x1b!@#$%^&*()_+\x08\tQWERTYUIOP{}\n\x00ASDFGHJKL:\"~\x00|ZXCVBNM<>?\x00\x00\x00 "),
    ],
    [
        table(b"\x00\x1b1234567890-=\x08\tQWERTYUIOP[]\n\x00ASDFGHJKL;'`\x00\\ZXCVBNM,./\x00\x00\x00 "),
        table(b"\x00\x1b!@#$%^&*()_+\x08\tqwertyuiop{}\n\x00asdfghjkl:\"~\x00|zxcvbnm<>?\x00\x00\x00 "),
    ],
];

/// Pad a layout row out to `SCANCODE_MAX` entries; keys past Space map to NUL
const fn table(keys: &[u8]) -> [u8; SCANCODE_MAX as usize] {
    let mut out = [0u8; SCANCODE_MAX as usize];
    let mut i = 0;
    while i < keys.len() {
        out[i] = keys[i];
        i += 1;
    }
    out
}

/// Look up a scancode in the table selected by the modifiers
pub fn translate(scancode: u8, mods: Modifiers) -> Option<u8> {
    if scancode >= SCANCODE_MAX {
        return None;
    }
    let caps = mods.contains(Modifiers::CAPS_LOCK) as usize;
    let shift = mods.contains(Modifiers::SHIFT) as usize;
    match KEYMAP[caps][shift][scancode as usize] {
        0 => None,
        c => Some(c),
    }
}

/// Map a character to its control code (`a` -> `0x01`)
pub fn control_code(c: u8) -> u8 {
    c.to_ascii_uppercase().wrapping_sub(0x40)
}

/// Stateful scancode decoder
pub struct ScancodeDecoder {
    set: ScancodeSet1,
    state: ModifierState,
}

impl Default for ScancodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScancodeDecoder {
    pub fn new() -> Self {
        Self {
            set: ScancodeSet1::new(),
            state: ModifierState::default(),
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> ModifierState {
        self.state
    }

    /// Decode one byte. `decckm` selects application cursor keys.
    pub fn feed(&mut self, byte: u8, decckm: bool) -> Option<KeyEvent> {
        let prefixed =
            std::mem::replace(&mut self.state.extended_pending, byte == EXTENDED_PREFIX);
        let (event, extended) = match self.set.advance_state(byte) {
            Ok(Some(event)) => (event, prefixed),
            Ok(None) => return None,
            // prefix followed by a code the set does not know: the set is
            // back at its start state, so decode the byte on its own
            Err(_) if prefixed => (self.set.advance_state(byte).ok().flatten()?, false),
            Err(_) => return None,
        };

        if extended {
            if let Some(handled) = self.extended(&event, decckm) {
                return handled;
            }
            // not a console key: decode the byte as if it had no prefix
            let event = self.set.advance_state(byte).ok().flatten()?;
            return self.ordinary(byte, &event);
        }
        self.ordinary(byte, &event)
    }

    /// Keys behind the `0xE0` prefix. `None` means "not an extended key,
    /// decode normally".
    fn extended(
        &mut self,
        event: &pc_keyboard::KeyEvent,
        decckm: bool,
    ) -> Option<Option<KeyEvent>> {
        let input = |bytes: &[u8]| Some(Some(KeyEvent::Input(KeyBytes::seq(bytes))));
        match event.code {
            KeyCode::RControl => {
                self.state.mods.set(Modifiers::CTRL, event.state != KeyState::Up);
                Some(None)
            }
            _ if event.state == KeyState::Up => None,
            KeyCode::NumpadEnter => input(b"\n"),
            KeyCode::NumpadDivide => input(b"/"),
            KeyCode::ArrowUp => input(&cursor_key(b'A', decckm)),
            KeyCode::ArrowDown => input(&cursor_key(b'B', decckm)),
            KeyCode::ArrowRight => input(&cursor_key(b'C', decckm)),
            KeyCode::ArrowLeft => input(&cursor_key(b'D', decckm)),
            KeyCode::Home => input(b"\x1b[1~"),
            KeyCode::End => input(b"\x1b[4~"),
            KeyCode::PageUp => input(b"\x1b[5~"),
            KeyCode::PageDown => input(b"\x1b[6~"),
            KeyCode::Delete => input(b"\x1b[3~"),
            _ => None,
        }
    }

    /// Modifiers, Alt+Fn, then table lookup of the make code
    fn ordinary(&mut self, byte: u8, event: &pc_keyboard::KeyEvent) -> Option<KeyEvent> {
        let pressed = event.state != KeyState::Up;
        let modifier = match event.code {
            KeyCode::LShift | KeyCode::RShift => Modifiers::SHIFT,
            KeyCode::LControl | KeyCode::RControl => Modifiers::CTRL,
            KeyCode::LAlt | KeyCode::RAltGr => Modifiers::ALT,
            KeyCode::CapsLock => {
                if pressed {
                    self.state.mods.toggle(Modifiers::CAPS_LOCK);
                }
                return None;
            }
            KeyCode::NumpadLock => return None,
            _ => Modifiers::empty(),
        };
        if !modifier.is_empty() {
            self.state.mods.set(modifier, pressed);
            return None;
        }

        if self.state.mods.contains(Modifiers::ALT) {
            return if pressed { switch_slot(event.code) } else { None };
        }
        if !pressed {
            return None;
        }

        let mut c = translate(byte, self.state.mods)?;
        if self.state.mods.contains(Modifiers::CTRL) {
            c = control_code(c);
        }
        Some(KeyEvent::Input(KeyBytes::byte(c)))
    }
}

/// F1..F8 select terminals 0..7
fn switch_slot(code: KeyCode) -> Option<KeyEvent> {
    let slot = match code {
        KeyCode::F1 => 0,
        KeyCode::F2 => 1,
        KeyCode::F3 => 2,
        KeyCode::F4 => 3,
        KeyCode::F5 => 4,
        KeyCode::F6 => 5,
        KeyCode::F7 => 6,
        KeyCode::F8 => 7,
        _ => return None,
    };
    Some(KeyEvent::SwitchSlot(slot))
}

/// Arrow key sequence: `ESC [ X` normally, `ESC O X` in application mode
fn cursor_key(key: u8, application: bool) -> [u8; 3] {
    if application {
        [0x1b, b'O', key]
    } else {
        [0x1b, b'[', key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL: u8 = 0x1d;
    const SHIFT_LEFT: u8 = 0x2a;
    const SHIFT_RIGHT: u8 = 0x36;
    const ALT_LEFT: u8 = 0x38;
    const CAPS_LOCK: u8 = 0x3a;
    const NUM_LOCK: u8 = 0x45;
    const BREAK_BIT: u8 = 0x80;

    fn feed_all(decoder: &mut ScancodeDecoder, bytes: &[u8], decckm: bool) -> Vec<KeyEvent> {
        bytes.iter().filter_map(|&b| decoder.feed(b, decckm)).collect()
    }

    fn input(bytes: &[u8]) -> KeyEvent {
        KeyEvent::Input(KeyBytes::seq(bytes))
    }

    #[test]
    fn test_plain_keys() {
        let mut decoder = ScancodeDecoder::new();
        // a, 1, Enter, Space
        let events = feed_all(&mut decoder, &[0x1e, 0x02, 0x1c, 0x39], false);
        assert_eq!(events, vec![input(b"a"), input(b"1"), input(b"\n"), input(b" ")]);
    }

    #[test]
    fn test_break_codes_produce_nothing() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decoder.feed(0x9e, false), None);
        assert_eq!(decoder.feed(0x57, false), None);
        assert_eq!(decoder.feed(0xff, false), None);
    }

    #[test]
    fn test_shift_and_caps_lock_tables() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(
            feed_all(&mut decoder, &[0x2a, 0x1e, 0x02, 0xaa], false),
            vec![input(b"A"), input(b"!")]
        );

        // caps lock toggles on press only; its break code is ignored
        assert_eq!(
            feed_all(&mut decoder, &[0x3a, 0xba, 0x1e, 0x02], false),
            vec![input(b"A"), input(b"1")]
        );
        // shift with caps lock gives lower case letters and shifted symbols
        assert_eq!(
            feed_all(&mut decoder, &[0x36, 0x1e, 0x02, 0xb6], false),
            vec![input(b"a"), input(b"!")]
        );
        assert_eq!(feed_all(&mut decoder, &[0x3a, 0x1e], false), vec![input(b"a")]);
    }

    #[test]
    fn test_ctrl_maps_letters_to_control_codes() {
        let combinations = [
            Modifiers::empty(),
            Modifiers::SHIFT,
            Modifiers::CAPS_LOCK,
            Modifiers::SHIFT | Modifiers::CAPS_LOCK,
        ];
        for scancode in 0..SCANCODE_MAX {
            for mods in combinations {
                let Some(base) = translate(scancode, mods) else { continue };
                if !base.is_ascii_alphabetic() {
                    continue;
                }
                let mut decoder = ScancodeDecoder::new();
                decoder.state.mods = mods | Modifiers::CTRL;
                assert_eq!(
                    decoder.feed(scancode, false),
                    Some(KeyEvent::Input(KeyBytes::byte(base.to_ascii_uppercase() - 0x40)))
                );
            }
        }

        // Ctrl+C through the real make/break sequence
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(
            feed_all(&mut decoder, &[0x1d, 0x2e, 0x9d, 0x2e], false),
            vec![input(&[0x03]), input(b"c")]
        );
    }

    #[test]
    fn test_modifier_press_release_restores_state() {
        for make in [CTRL, SHIFT_LEFT, SHIFT_RIGHT, ALT_LEFT] {
            let mut decoder = ScancodeDecoder::new();
            decoder.feed(CAPS_LOCK, false);
            let before = decoder.state();
            assert_eq!(decoder.feed(make, false), None);
            assert_ne!(decoder.state(), before);
            assert_eq!(decoder.feed(make | BREAK_BIT, false), None);
            assert_eq!(decoder.state(), before);
        }
    }

    #[test]
    fn test_num_lock_is_ignored() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decoder.feed(NUM_LOCK, false), None);
        assert_eq!(decoder.state(), ModifierState::default());
    }

    #[test]
    fn test_alt_function_keys_switch_slots() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decoder.feed(ALT_LEFT, false), None);
        assert_eq!(decoder.feed(0x3b, false), Some(KeyEvent::SwitchSlot(0)));
        assert_eq!(decoder.feed(0x42, false), Some(KeyEvent::SwitchSlot(7)));
        // F9 and ordinary keys are swallowed while Alt is held
        assert_eq!(decoder.feed(0x43, false), None);
        assert_eq!(decoder.feed(0x1e, false), None);
        decoder.feed(ALT_LEFT | BREAK_BIT, false);
        assert_eq!(decoder.feed(0x1e, false), Some(input(b"a")));
        // without Alt, function keys have no mapping
        assert_eq!(decoder.feed(0x3b, false), None);
    }

    #[test]
    fn test_extended_keys() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decoder.feed(0xe0, false), None);
        assert!(decoder.state().extended_pending);
        assert_eq!(decoder.feed(0x1c, false), Some(input(b"\n")));
        assert!(!decoder.state().extended_pending);

        let bytes = [0xe0, 0x35, 0xe0, 0x47, 0xe0, 0x4f, 0xe0, 0x49, 0xe0, 0x51, 0xe0, 0x53];
        assert_eq!(
            feed_all(&mut decoder, &bytes, false),
            vec![
                input(b"/"),
                input(b"\x1b[1~"),
                input(b"\x1b[4~"),
                input(b"\x1b[5~"),
                input(b"\x1b[6~"),
                input(b"\x1b[3~"),
            ]
        );
        // extended break codes other than Ctrl produce nothing
        assert!(feed_all(&mut decoder, &[0xe0, 0xc8, 0xe0, 0xb5], false).is_empty());
    }

    #[test]
    fn test_extended_fallthrough_and_right_ctrl() {
        let mut decoder = ScancodeDecoder::new();
        // right Alt (E0 38) is decoded as Alt
        feed_all(&mut decoder, &[0xe0, 0x38], false);
        assert!(decoder.state().mods.contains(Modifiers::ALT));
        feed_all(&mut decoder, &[0xe0, 0xb8], false);
        assert!(!decoder.state().mods.contains(Modifiers::ALT));

        feed_all(&mut decoder, &[0xe0, 0x1d], false);
        assert!(decoder.state().mods.contains(Modifiers::CTRL));
        feed_all(&mut decoder, &[0xe0, 0x9d], false);
        assert!(!decoder.state().mods.contains(Modifiers::CTRL));
    }

    #[test]
    fn test_unlisted_extended_key_decodes_as_plain_byte() {
        let mut decoder = ScancodeDecoder::new();
        // E0 20 is a media key; the console reads it as the 0x20 key
        assert_eq!(feed_all(&mut decoder, &[0xe0, 0x20], false), vec![input(b"d")]);
        // E0 52 (Insert) lands on a blank table entry
        assert!(feed_all(&mut decoder, &[0xe0, 0x52], false).is_empty());
        assert_eq!(decoder.state(), ModifierState::default());
    }

    #[test]
    fn test_decckm_changes_only_arrow_form() {
        let arrows = [(0x48, b'A'), (0x50, b'B'), (0x4d, b'C'), (0x4b, b'D')];
        for (code, key) in arrows {
            let mut decoder = ScancodeDecoder::new();
            assert_eq!(decoder.feed(0xe0, false), None);
            assert_eq!(decoder.feed(code, false), Some(input(&[0x1b, b'[', key])));
            assert_eq!(decoder.feed(0xe0, true), None);
            assert_eq!(decoder.feed(code, true), Some(input(&[0x1b, b'O', key])));
        }

        // Home keeps its form in application mode
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(feed_all(&mut decoder, &[0xe0, 0x47], true), vec![input(b"\x1b[1~")]);
    }
}

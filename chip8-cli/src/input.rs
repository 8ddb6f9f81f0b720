//! Keypad input from standard input.
//!
//! Each whitespace separated token is one key event, named by its host character:
//!
//! - `+w` press
//! - `-w` release
//! - `w` tap, pressed then released shortly after
use std::{io::BufRead, thread, time::Duration};

use chip8::prelude::*;
use log::{debug, warn};

use crate::config::KeyMap;

/// How long a tapped key is held down.
const TAP_DURATION: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press(KeyCode),
    Release(KeyCode),
    Tap(KeyCode),
}

impl KeyEvent {
    pub fn parse(token: &str, keymap: &KeyMap) -> Option<Self> {
        let mut chars = token.chars();
        let first = chars.next()?;

        let event = match first {
            '+' => Self::Press(keymap.map_key(chars.next()?)?),
            '-' => Self::Release(keymap.map_key(chars.next()?)?),
            host_key => Self::Tap(keymap.map_key(host_key)?),
        };

        // Exactly one character names the key.
        if chars.next().is_some() {
            return None;
        }

        Some(event)
    }

    pub fn apply(self, keypad: &Keypad) {
        match self {
            Self::Press(keycode) => keypad.set_down(keycode, true),
            Self::Release(keycode) => keypad.set_down(keycode, false),
            Self::Tap(keycode) => {
                keypad.set_down(keycode, true);
                thread::sleep(TAP_DURATION);
                keypad.set_down(keycode, false);
            }
        }
    }
}

/// Feed key events into the keypad until the reader is exhausted.
pub fn feed_keys(reader: impl BufRead, keymap: &KeyMap, keypad: &Keypad) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("failed to read input: {err}");
                break;
            }
        };

        for token in line.split_whitespace() {
            match KeyEvent::parse(token, keymap) {
                Some(event) => {
                    debug!("{event:?}");
                    event.apply(keypad);
                }
                None => warn!("unknown key event: {token}"),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_events() {
        let keymap = KeyMap::default();

        assert_eq!(
            KeyEvent::parse("+w", &keymap),
            Some(KeyEvent::Press(KeyCode::Key5))
        );
        assert_eq!(
            KeyEvent::parse("-W", &keymap),
            Some(KeyEvent::Release(KeyCode::Key5))
        );
        assert_eq!(
            KeyEvent::parse("4", &keymap),
            Some(KeyEvent::Tap(KeyCode::KeyC))
        );

        assert_eq!(KeyEvent::parse("+", &keymap), None);
        assert_eq!(KeyEvent::parse("ww", &keymap), None);
        assert_eq!(KeyEvent::parse("p", &keymap), None);
    }

    #[test]
    fn test_feed_keys() {
        let keymap = KeyMap::default();
        let keypad = Keypad::new();

        feed_keys("+q +v\n-q bogus\n".as_bytes(), &keymap, &keypad);

        assert!(!keypad.is_down(0x4));
        assert!(keypad.is_down(0xF));
    }
}

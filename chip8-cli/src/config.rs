//! Configuration file
//!
//! ```yaml
//! vm:
//!   clock_frequency: 700
//!   rng_seed: 1234
//! keymap:
//!   "j": 10
//!   "k": 11
//! ```
use std::{collections::BTreeMap, fs::File, path::Path};

use chip8::prelude::*;
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub vm: Chip8Conf,
    /// Bindings that replace entries of the default keymap.
    pub keymap: BTreeMap<char, KeyCode>,
}

impl CliConfig {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, CliError> {
        let file = File::open(filepath.as_ref())?;

        let config: CliConfig = serde_yaml::from_reader(file)?;
        log::debug!("loaded config: {:#?}", config);

        Ok(config)
    }

    pub fn keymap(&self) -> KeyMap {
        let mut keymap = KeyMap::default();
        for (host_key, keycode) in &self.keymap {
            keymap.bind(*host_key, *keycode);
        }
        keymap
    }
}

/// Maps host characters to keypad keys.
#[derive(Debug, Clone)]
pub struct KeyMap {
    keys: BTreeMap<char, KeyCode>,
}

impl Default for KeyMap {
    /// The classic layout, keeping the keypad's 4x4 shape on a QWERTY keyboard.
    ///
    /// ```text
    /// 1 2 3 C      1 2 3 4
    /// 4 5 6 D  ->  q w e r
    /// 7 8 9 E      a s d f
    /// A 0 B F      z x c v
    /// ```
    fn default() -> Self {
        use KeyCode::*;

        #[rustfmt::skip]
        let keys = [
            ('1', Key1), ('2', Key2), ('3', Key3), ('4', KeyC),
            ('q', Key4), ('w', Key5), ('e', Key6), ('r', KeyD),
            ('a', Key7), ('s', Key8), ('d', Key9), ('f', KeyE),
            ('z', KeyA), ('x', Key0), ('c', KeyB), ('v', KeyF),
        ];

        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl KeyMap {
    pub fn bind(&mut self, host_key: char, keycode: KeyCode) {
        self.keys.insert(host_key.to_ascii_lowercase(), keycode);
    }

    /// Given a host character, map it to a keypad key. Letters are case insensitive.
    pub fn map_key(&self, host_key: char) -> Option<KeyCode> {
        self.keys.get(&host_key.to_ascii_lowercase()).copied()
    }
}

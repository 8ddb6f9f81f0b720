//! IO device interface
//!
//! Handles shared between the execution thread and host collaborators.
//! The keypad is written by the host and read by the VM. The monitor is
//! written by the VM and read by the host.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, PoisonError, RwLock,
};

use crate::{constants::*, display::FrameView};

/// Sixteen key hexadecimal keypad.
///
/// Cloning the handle shares the same key state.
#[derive(Clone, Default)]
pub struct Keypad {
    inner: Arc<KeypadInner>,
}

#[derive(Default)]
struct KeypadInner {
    /// Keyboard input state, one flag per key.
    keys: [AtomicBool; KEY_COUNT as usize],
    /// Last key that went down since the current wait was armed.
    latch: Mutex<Option<u8>>,
    pressed: Condvar,
    /// Indicates that the machine is waiting for a keypress.
    waiting: AtomicBool,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    /// Checks immediately whether the given key is currently pressed.
    ///
    /// Values outside of the keypad are never pressed.
    pub fn is_down(&self, key_id: u8) -> bool {
        self.inner
            .keys
            .get(key_id as usize)
            .map(|key| key.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Sets the keyboard key input state.
    ///
    /// A key going down wakes the machine if it is waiting for input.
    pub fn set_down(&self, key: KeyCode, pressed: bool) {
        let key_id = key.as_u8();
        self.inner.keys[key_id as usize].store(pressed, Ordering::Release);

        if pressed {
            let mut latch = self
                .inner
                .latch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *latch = Some(key_id);
            self.inner.pressed.notify_all();
        }
    }

    /// Check whether any key is pressed down.
    pub fn any_key(&self) -> bool {
        self.inner.keys.iter().any(|key| key.load(Ordering::Acquire))
    }

    /// Whether the machine is suspended until a key goes down.
    pub fn is_waiting(&self) -> bool {
        self.inner.waiting.load(Ordering::Acquire)
    }

    /// Forget earlier key presses so that only a fresh key down satisfies the next wait.
    pub(crate) fn arm_wait(&self) {
        *self
            .inner
            .latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.waiting.store(true, Ordering::Release);
    }

    /// Take the key that went down since the wait was armed, completing the wait.
    pub(crate) fn take_key(&self) -> Option<u8> {
        let key_id = self
            .inner
            .latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if key_id.is_some() {
            self.inner.waiting.store(false, Ordering::Release);
        }

        key_id
    }

    /// Block until a key goes down, polling `running` at a fixed interval.
    ///
    /// Returns `false` when `running` is cleared before a key was pressed.
    /// The latched key is left in place for [`Keypad::take_key`], so a key
    /// pressed in the meantime is picked up when the wait is entered again.
    pub(crate) fn wait_key_down(&self, running: &AtomicBool) -> bool {
        let mut latch = self
            .inner
            .latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            if latch.is_some() {
                return true;
            }

            if !running.load(Ordering::Acquire) {
                return false;
            }

            latch = self
                .inner
                .pressed
                .wait_timeout(latch, KEY_POLL_INTERVAL)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|err| err.into_inner().0);
        }
    }

    /// Set all keys to up and cancel any pending wait.
    pub fn reset(&self) {
        for key in self.inner.keys.iter() {
            key.store(false, Ordering::Release);
        }
        *self
            .inner
            .latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.waiting.store(false, Ordering::Release);
    }
}

/// Output published by the execution thread.
///
/// Renderers receive snapshots and can never mutate the machine.
#[derive(Clone, Default)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

#[derive(Default)]
struct MonitorInner {
    frame: RwLock<FrameView>,
    /// Switch tracking whether the buzzer should be on or off.
    buzzer: AtomicBool,
}

impl Monitor {
    pub fn new() -> Self {
        Default::default()
    }

    /// Copy of the most recently published frame.
    ///
    /// Frames may be published at any time, so consecutive snapshots
    /// can differ mid-sprite.
    pub fn frame(&self) -> FrameView {
        self.inner
            .frame
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a tone should currently be playing.
    pub fn buzzer(&self) -> bool {
        self.inner.buzzer.load(Ordering::Acquire)
    }

    pub(crate) fn publish_frame(&self, frame: FrameView) {
        *self
            .inner
            .frame
            .write()
            .unwrap_or_else(PoisonError::into_inner) = frame;
    }

    pub(crate) fn set_buzzer(&self, state: bool) {
        self.inner.buzzer.store(state, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode),
        }
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use num_traits::AsPrimitive;
    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integer type
            deserializer.deserialize_i64(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl KeyCodeVisitor {
        #[inline]
        fn check_int<N, E>(val: N) -> Result<u8, E>
        where
            N: AsPrimitive<i64>,
            E: Error,
        {
            let n = val.as_();
            if !(0..KEY_COUNT as i64).contains(&n) {
                Err(E::invalid_value(Unexpected::Signed(n), &InvalidKeyCode))
            } else {
                Ok(n as u8)
            }
        }
    }

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer between 0 and 15")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            let key_id = Self::check_int(v)?;
            KeyCode::try_from(key_id).map_err(|err| E::invalid_value(Unexpected::Signed(v), &err))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            if v >= KEY_COUNT as u64 {
                return Err(E::invalid_value(Unexpected::Unsigned(v), &InvalidKeyCode));
            }
            self.visit_i64(v as i64)
        }
    }
}

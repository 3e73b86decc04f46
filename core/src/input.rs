//! Controller state and audience selections
//!
//! The Game Boy pad has exactly eight buttons. [`ControllerState`] is the set
//! of buttons held down while the core advances, [`Selection`] is one event
//! coming from the audience (a button press or a repeat multiplier).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the eight Game Boy buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
            Button::Select => "select",
            Button::Start => "start",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string names no button or multiplier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown input '{0}' (expected a, b, up, down, left, right, select, start or a number)")]
pub struct ParseInputError(pub String);

impl FromStr for Button {
    type Err = ParseInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Button::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseInputError(s.to_string()))
    }
}

/// Buttons held down on the pad
///
/// A fixed record of eight flags. The default value is the empty set (no
/// buttons held), which is also what the idle detector uses as its control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerState {
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub left: bool,
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
}

impl ControllerState {
    /// No buttons held
    pub const NONE: ControllerState = ControllerState {
        up: false,
        right: false,
        down: false,
        left: false,
        a: false,
        b: false,
        select: false,
        start: false,
    };

    /// A state with a single button held
    pub fn pressing(button: Button) -> Self {
        let mut state = Self::NONE;
        state.set(button, true);
        state
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        match button {
            Button::Up => self.up = pressed,
            Button::Down => self.down = pressed,
            Button::Left => self.left = pressed,
            Button::Right => self.right = pressed,
            Button::A => self.a = pressed,
            Button::B => self.b = pressed,
            Button::Select => self.select = pressed,
            Button::Start => self.start = pressed,
        }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
            Button::A => self.a,
            Button::B => self.b,
            Button::Select => self.select,
            Button::Start => self.start,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Buttons currently held, in [`Button::ALL`] order
    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.is_pressed(*b))
    }

    /// Joypad arguments in the core's `setJoypadState` order:
    /// up, right, down, left, a, b, select, start
    pub fn to_joypad_args(self) -> (i32, i32, i32, i32, i32, i32, i32, i32) {
        (
            self.up as i32,
            self.right as i32,
            self.down as i32,
            self.left as i32,
            self.a as i32,
            self.b as i32,
            self.select as i32,
            self.start as i32,
        )
    }
}

impl From<Button> for ControllerState {
    fn from(button: Button) -> Self {
        Self::pressing(button)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.pressed().map(Button::name).collect();
        f.write_str(&names.join("+"))
    }
}

/// One audience selection event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Press a button (repeated by the current multiplier)
    Press(Button),
    /// Set the repeat count for the next press
    Multiplier(u32),
}

impl FromStr for Selection {
    type Err = ParseInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u32>()
                .map(Selection::Multiplier)
                .map_err(|_| ParseInputError(s.to_string()));
        }
        s.parse::<Button>().map(Selection::Press)
    }
}

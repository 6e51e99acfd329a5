//! Command grammar
//!
//! A reply from the inference service is a single short command:
//!
//! | text      | action                          |
//! |-----------|---------------------------------|
//! | `M`       | move one step forward           |
//! | `C<deg>`  | rotate clockwise by `deg`       |
//! | `A<deg>`  | rotate anticlockwise by `deg`   |
//! | `B`       | shoot                           |
//! | `S`       | toggle shield                   |
//! | `S1`/`S0` | raise / lower shield            |
//!
//! Anything else is `Invalid`: the bot does nothing that turn.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a rotate command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spin {
    /// `C` commands (positive delta)
    Clockwise,
    /// `A` commands (negative delta)
    CounterClockwise,
}

impl Spin {
    fn prefix(self) -> char {
        match self {
            Spin::Clockwise => 'C',
            Spin::CounterClockwise => 'A',
        }
    }
}

/// A parsed command
///
/// Serialized as its canonical command text (`"M"`, `"C30"`, `"ERR"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Action {
    Move,
    RotateBy { degrees: f64, spin: Spin },
    ShieldSet(bool),
    ShieldToggle,
    Shoot,
    Invalid,
}

impl Action {
    /// Rotation delta in degrees, `C` positive and `A` negative
    pub fn rotation_delta(&self) -> Option<f64> {
        match *self {
            Action::RotateBy { degrees, spin: Spin::Clockwise } => Some(degrees),
            Action::RotateBy { degrees, spin: Spin::CounterClockwise } => Some(-degrees),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Action::Invalid)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move => f.write_str("M"),
            Action::RotateBy { degrees, spin } => write!(f, "{}{}", spin.prefix(), degrees),
            Action::ShieldSet(true) => f.write_str("S1"),
            Action::ShieldSet(false) => f.write_str("S0"),
            Action::ShieldToggle => f.write_str("S"),
            Action::Shoot => f.write_str("B"),
            Action::Invalid => f.write_str("ERR"),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

impl From<String> for Action {
    fn from(text: String) -> Self {
        parse(&text)
    }
}

/// Classify a raw reply. Total: never fails, unknown text becomes `Invalid`.
pub fn parse(raw: &str) -> Action {
    let text = raw.trim();
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return Action::Invalid;
    };
    let rest = chars.as_str();

    match first {
        'M' if rest.is_empty() => Action::Move,
        'B' if rest.is_empty() => Action::Shoot,
        'C' => parse_angle(rest).map_or(Action::Invalid, |degrees| Action::RotateBy {
            degrees,
            spin: Spin::Clockwise,
        }),
        'A' => parse_angle(rest).map_or(Action::Invalid, |degrees| Action::RotateBy {
            degrees,
            spin: Spin::CounterClockwise,
        }),
        'S' => match rest {
            "" => Action::ShieldToggle,
            "1" => Action::ShieldSet(true),
            "0" => Action::ShieldSet(false),
            _ => Action::Invalid,
        },
        _ => Action::Invalid,
    }
}

/// Finite float suffix of a rotate command
fn parse_angle(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

use core::fmt;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum::{Display, EnumString, IntoStaticStr};

/// The outcome label of a check.
///
/// Statuses are open strings: callers may map a check's pass or fail outcome to any
/// label. `GREEN`, `YELLOW` and `RED` form the built-in vocabulary and are the only
/// values understood by the concatenation evaluator. Labels carry no ordering of their
/// own; severity is compared through [`Status::signal`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(Cow<'static, str>);

impl Status {
    pub const GREEN: Self = Self(Cow::Borrowed("GREEN"));
    pub const YELLOW: Self = Self(Cow::Borrowed("YELLOW"));
    pub const RED: Self = Self(Cow::Borrowed("RED"));

    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(Cow::Owned(label.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tri-state value of this status, if it is one of GREEN, YELLOW or RED.
    #[must_use]
    pub fn signal(&self) -> Option<Signal> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Status {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Status {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl From<Signal> for Status {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Red => Self::RED,
            Signal::Yellow => Self::YELLOW,
            Signal::Green => Self::GREEN,
        }
    }
}

/// The closed tri-state domain, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Signal {
    Red,
    Yellow,
    Green,
}

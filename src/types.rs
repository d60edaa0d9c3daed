use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;

/// Which tier served (or absorbed) an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Primary,
    Fallback,
}

impl Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Lifecycle of the remote connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Remaining lifetime of a key.
///
/// Redis folds "absent", "persistent" and "can't tell" into negative numbers; this type keeps them apart while
/// [`KeyTtl::as_secs`] still produces the flat `-1` for anything that is not a running countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyTtl {
    Remaining(Duration),
    /// The key exists and never expires.
    NoExpiry,
    Absent,
    /// The tier couldn't be asked.
    Unknown,
}

impl KeyTtl {
    /// Interpret a Redis `PTTL` reply.
    pub fn from_pttl(millis: i64) -> Self {
        match millis {
            -2 => Self::Absent,
            -1 => Self::NoExpiry,
            ms if ms >= 0 => Self::Remaining(Duration::from_millis(ms as u64)),
            _ => Self::Unknown,
        }
    }

    pub fn as_secs(&self) -> i64 {
        match self {
            Self::Remaining(d) => d.as_secs_f64().round() as i64,
            _ => -1,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Remaining(d) => Some(*d),
            _ => None,
        }
    }
}

/// Result of a facade operation.
///
/// The facade never fails; instead it reports what it could do, which tier did it, and, if the primary tier had to be
/// bypassed or a payload was unusable, why.
#[derive(Clone)]
pub struct Outcome<T> {
    value:      T,
    tier:       Tier,
    diagnostic: Option<Arc<CacheError>>,
}

impl<T> Outcome<T> {
    pub(crate) fn new(value: T, tier: Tier) -> Self {
        Self {
            value,
            tier,
            diagnostic: None,
        }
    }

    pub(crate) fn with_diagnostic(mut self, diagnostic: Option<Arc<CacheError>>) -> Self {
        if diagnostic.is_some() {
            self.diagnostic = diagnostic;
        }
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn diagnostic(&self) -> Option<&CacheError> {
        self.diagnostic.as_deref()
    }

    /// True when something went wrong along the way, even if the operation completed on the fallback.
    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value:      f(self.value),
            tier:       self.tier,
            diagnostic: self.diagnostic,
        }
    }
}

impl<T> Debug for Outcome<T>
where
    T: Debug,
{
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Outcome")
            .field("value", &self.value)
            .field("tier", &self.tier)
            .field("diagnostic", &self.diagnostic.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

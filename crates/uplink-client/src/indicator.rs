// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Status indicator mapping.
//!
//! A fixed, pure mapping from [`ConnectionStatus`] to a visual affordance.
//! No state, no timers, no side effects; rendering toolkits translate the
//! [`SignalColor`] into their own color values and drive the pulse animation
//! themselves.

use crate::monitor::ConnectionStatus;

/// Semantic color of a status signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalColor {
    /// Healthy / connected.
    Positive,
    /// In progress / attention.
    Warning,
    /// Failed / unreachable.
    Negative,
    /// No meaningful signal.
    Neutral,
}

/// Visual affordance for a connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorStyle {
    /// Semantic signal color.
    pub color: SignalColor,
    /// Whether the signal should pulse.
    pub pulsing: bool,
    /// Single-character glyph for compact display.
    pub glyph: &'static str,
    /// Short uppercase label for expanded display.
    pub label: &'static str,
}

impl IndicatorStyle {
    /// Map a connection status to its visual signal.
    #[must_use]
    pub fn for_status(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Connected => Self {
                color: SignalColor::Positive,
                pulsing: false,
                glyph: "●",
                label: "CONNECTED",
            },
            ConnectionStatus::Connecting => Self {
                color: SignalColor::Warning,
                pulsing: true,
                glyph: "◐",
                label: "CONNECTING",
            },
            ConnectionStatus::Disconnected => Self {
                color: SignalColor::Negative,
                pulsing: false,
                glyph: "○",
                label: "DISCONNECTED",
            },
        }
    }
}

/// The steady neutral signal, used when no status is meaningful.
impl Default for IndicatorStyle {
    fn default() -> Self {
        Self {
            color: SignalColor::Neutral,
            pulsing: false,
            glyph: "○",
            label: "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_is_steady_positive() {
        let style = IndicatorStyle::for_status(ConnectionStatus::Connected);
        assert_eq!(style.color, SignalColor::Positive);
        assert!(!style.pulsing);
        assert_eq!(style.label, "CONNECTED");
    }

    #[test]
    fn connecting_is_pulsing_warning() {
        let style = IndicatorStyle::for_status(ConnectionStatus::Connecting);
        assert_eq!(style.color, SignalColor::Warning);
        assert!(style.pulsing);
    }

    #[test]
    fn disconnected_is_steady_negative() {
        let style = IndicatorStyle::for_status(ConnectionStatus::Disconnected);
        assert_eq!(style.color, SignalColor::Negative);
        assert!(!style.pulsing);
    }

    #[test]
    fn default_is_steady_neutral() {
        let style = IndicatorStyle::default();
        assert_eq!(style.color, SignalColor::Neutral);
        assert!(!style.pulsing);
    }
}

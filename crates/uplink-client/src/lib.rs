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

//! Uplink client library for monitoring connectivity to an automation backend.
//!
//! This library provides a modular, reusable architecture for tracking whether
//! a remote automation backend is reachable. It supports multiple layers that
//! can be used independently or composed together:
//!
//! - **Probe layer**: The health-check boundary (a [`Probe`] yields a boolean
//!   outcome), with an HTTP implementation and a closure adapter
//! - **Monitor layer**: Connection lifecycle management with a startup delay,
//!   bounded fixed-delay retries, and a slow periodic resweep after retries
//!   are exhausted
//! - **Indicator layer**: A pure mapping from connection status to a visual
//!   signal, independent of any UI toolkit
//!
//! # Quick Start
//!
//! Use [`ConnectionMonitor`] with an [`HttpProbe`] for full-stack operation:
//!
//! ```no_run
//! use uplink_client::{ConnectionMonitor, ConnectionStatus, HttpProbe, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let probe = HttpProbe::new("http://localhost:5678/healthz");
//!     let monitor = ConnectionMonitor::new(MonitorConfig::default(), probe);
//!
//!     let mut status = monitor.subscribe();
//!     monitor.start();
//!
//!     while status.changed().await.is_ok() {
//!         let current = *status.borrow();
//!         println!("backend status: {:?}", current);
//!         if current == ConnectionStatus::Connected {
//!             break;
//!         }
//!     }
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! The probe boundary accepts any async health check:
//!
//! ```no_run
//! use uplink_client::{ConnectionMonitor, FnProbe, MonitorConfig, ProbeError};
//!
//! let probe = FnProbe::new(|| async { Ok::<_, ProbeError>(true) });
//! let monitor = ConnectionMonitor::new(MonitorConfig::default(), probe);
//! ```
//!
//! The indicator mapping needs no monitor at all:
//!
//! ```
//! use uplink_client::{ConnectionStatus, IndicatorStyle, SignalColor};
//!
//! let style = IndicatorStyle::for_status(ConnectionStatus::Connected);
//! assert_eq!(style.color, SignalColor::Positive);
//! assert!(!style.pulsing);
//! ```

pub mod indicator;
pub mod monitor;
pub mod probe;

pub use indicator::{IndicatorStyle, SignalColor};
pub use monitor::{ConnectionMonitor, ConnectionStatus, MonitorConfig, MonitorEvent, MonitorStats};
pub use probe::{FnProbe, HttpProbe, Probe, ProbeError};

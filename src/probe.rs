//! Probe Layer
//!
//! A probe performs one reachability check against a fixed target and reports
//! the outcome. Unreachable targets are outcomes, not errors.
//!
//! - [`Probe`]: Core trait for reachability checks
//! - [`HttpProbe`]: HTTP(S) request probe built on `reqwest`

mod http;
mod traits;

pub use http::{DEFAULT_ACCEPTED_STATUSES, DEFAULT_TARGET_URL, DEFAULT_TIMEOUT, HttpProbe, ProbeConfig};
pub use traits::{Probe, ProbeError, ProbeOutcome};

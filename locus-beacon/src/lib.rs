//! locus-beacon library - anchor-side telemetry agent
//!
//! Collects raw sightings, averages them per scan window and posts one
//! telemetry report per window to the location server.

pub mod agent;
pub mod client;
pub mod config;
pub mod scan;

pub use agent::{collect_window, discard_pending, Agent, AgentSettings, WindowOutcome};
pub use client::{ClientError, TelemetryClient};
pub use config::BeaconConfig;
pub use scan::{parse_sighting_line, ScanAccumulator, Sighting};

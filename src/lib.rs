//! Gabin bridge library
//!
//! Bridges a control panel to the Gabin automatic camera director over
//! OSC/UDP: outbound intents become OSC commands, inbound feedback becomes
//! host-visible variables.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod state;
pub mod transport;

pub use bridge::{Command, GabinBridge};
pub use config::BridgeConfig;
pub use transport::ConnectionState;

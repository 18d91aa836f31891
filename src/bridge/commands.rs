//! Outbound command table
//!
//! The fixed set of host intents and the OSC payloads they resolve to.
//! Kept data-driven so the mapping can be audited and tested without a
//! transport.

use rosc::{OscMessage, OscType};

use super::feedback;

/// Address that starts the automation
pub const START_ADDR: &str = "/gabin/on";
/// Address that stops the automation
pub const STOP_ADDR: &str = "/gabin/off";
/// Address toggling autocam
pub const AUTOCAM_ADDR: &str = "/autocam";
/// Address requesting a ready-status report
pub const IS_READY_ADDR: &str = "/gabin/is-ready";

/// Registration table: one entry per feedback stream Gabin can push,
/// pairing the register address with the callback address it should use.
pub const REGISTRATIONS: [(&str, &str); 3] = [
    ("/register/shot", feedback::SHOT_ADDR),
    ("/register/autocam", feedback::AUTOCAM_ADDR),
    ("/register/defaultProfile", feedback::PROFILE_ADDR),
];

/// Local endpoint embedded in registration and status-request messages so
/// Gabin knows where to push feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEndpoint {
    pub host: String,
    pub port: u16,
}

impl FeedbackEndpoint {
    /// The (host, port, callback address) triple, all as OSC strings.
    fn args(&self, callback: &str) -> Vec<OscType> {
        vec![
            OscType::String(self.host.clone()),
            OscType::String(self.port.to_string()),
            OscType::String(callback.to_string()),
        ]
    }
}

/// Host-invocable intents, each resolving to a fixed OSC payload.
#[derive(Debug, Clone)]
pub enum Command {
    /// Re-subscribe to Gabin's feedback streams
    Register,
    /// Start the automation
    Start,
    /// Stop the automation
    Stop,
    /// Tell Gabin which scene is live. The name lands in the address path
    /// verbatim; a literal `/` produces extra path segments.
    Scene(String),
    /// Trigger a specific shot by source name (also path-embedded)
    Source(String),
    /// Toggle availability of a mic
    Mic { name: String, on: bool },
    /// Toggle the autocam
    Autocam(bool),
    /// Ask Gabin to report its ready state to the feedback endpoint
    QueryReady,
}

impl Command {
    /// Resolve the intent to the OSC messages it sends, in order.
    pub fn messages(&self, feedback: &FeedbackEndpoint) -> Vec<OscMessage> {
        match self {
            Command::Register => REGISTRATIONS
                .iter()
                .map(|(addr, callback)| OscMessage {
                    addr: (*addr).to_string(),
                    args: feedback.args(callback),
                })
                .collect(),
            Command::Start => vec![message(START_ADDR, vec![])],
            Command::Stop => vec![message(STOP_ADDR, vec![])],
            Command::Scene(name) => vec![message(&format!("/scene/{name}"), vec![])],
            Command::Source(name) => vec![message(&format!("/source/{name}"), vec![])],
            Command::Mic { name, on } => vec![message(
                &format!("/mic/{name}"),
                vec![OscType::Int(i32::from(*on))],
            )],
            Command::Autocam(on) => {
                vec![message(AUTOCAM_ADDR, vec![OscType::Int(i32::from(*on))])]
            },
            Command::QueryReady => vec![message(
                IS_READY_ADDR,
                feedback.args(feedback::IS_READY_ADDR),
            )],
        }
    }
}

fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args,
    }
}

//! Inbound feedback table
//!
//! Maps the fixed set of OSC addresses Gabin pushes feedback on to variable
//! updates. Unknown addresses and messages with missing or unusable
//! arguments are ignored rather than raised.

use rosc::{OscMessage, OscType};

use crate::state::Variable;

/// Address Gabin reports shot changes on
pub const SHOT_ADDR: &str = "/feedback-shot";
/// Address Gabin reports autocam state changes on
pub const AUTOCAM_ADDR: &str = "/feedback-autocam";
/// Address Gabin reports profile changes on
pub const PROFILE_ADDR: &str = "/feedback-profile";
/// Address Gabin answers ready-status requests on
pub const IS_READY_ADDR: &str = "/feedback-gabin-is-ready";

/// Match a feedback message against the fixed table.
///
/// Returns the variable update it maps to, or `None` for unmatched
/// addresses and for known addresses without a usable first argument.
pub fn variable_update(msg: &OscMessage) -> Option<(Variable, String)> {
    let first = msg.args.first().and_then(arg_to_string);

    match msg.addr.as_str() {
        IS_READY_ADDR => {
            // only the literal string "true" counts as ready
            let value = first?;
            Some((Variable::IsReady, (value == "true").to_string()))
        },
        SHOT_ADDR => Some((Variable::CurrentShot, first?)),
        AUTOCAM_ADDR => Some((Variable::Autocam, first?)),
        _ => None,
    }
}

/// Render an OSC argument the way the host displays it.
fn arg_to_string(arg: &OscType) -> Option<String> {
    match arg {
        OscType::String(s) => Some(s.clone()),
        OscType::Int(v) => Some(v.to_string()),
        OscType::Long(v) => Some(v.to_string()),
        OscType::Float(v) => Some(v.to_string()),
        OscType::Double(v) => Some(v.to_string()),
        OscType::Bool(v) => Some(v.to_string()),
        _ => None,
    }
}

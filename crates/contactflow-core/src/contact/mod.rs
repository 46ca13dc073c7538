//! Contact domain module.
//!
//! - `payload`: the typed working copy of a contact (`ContactPayload`) and its patch type
//! - `social`: social platforms and profiles found in a payload
//! - `preference`: derived communication-preference summary

mod payload;
pub mod preference;
mod social;

pub use payload::{ContactPayload, ContactPayloadPatch};
pub use preference::{CommunicationChannel, CommunicationPreference};
pub use social::{SocialPlatform, SocialProfile};

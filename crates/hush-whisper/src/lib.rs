pub mod engine;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod janitor;
pub mod transport;
pub mod trigger;

pub use engine::{SubmittedContent, WhisperService};
pub use error::WhisperError;
pub use gate::{Disclosure, RevealToken};
pub use transport::{Action, GateError, MembershipGate, Transport, TransportError};
pub use trigger::{detect, TriggerOutcome};

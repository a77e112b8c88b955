//! Beacon/response exchange between two devices.
//!
//! Both sides run the same independent automaton and only synchronize through
//! the codes they show each other.

mod capture;
mod gate;
mod machine;
mod payload;
mod session;

pub use capture::{CaptureEvent, CodeRenderer};
pub use gate::{DEFAULT_MIN_INTERVAL, ScanGate};
pub use machine::{DecryptFailure, Exchange, ExchangeState, ScanOutcome};
pub use payload::{
    Beacon, PAYLOAD_VERSION, Payload, PayloadError, Response, make_beacon, make_response,
    parse_payload,
};
pub use session::{BEACON_KEY_FILE, ExchangeSession};

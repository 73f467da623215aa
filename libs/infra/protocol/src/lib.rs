//! The GATT-agnostic half of the BLE registration/admin protocol: framing,
//! HMAC authentication, the upsert session state machine, command parsing,
//! enrollment quality gates and response fragmentation. Everything here is
//! transport-free; `faceaccess-transport` is the thin `bluer` bridge that
//! drives a `Connection` with bytes in and out.

pub mod commands;
pub mod dispatcher;
pub mod enrollment;
pub mod fragment;
pub mod framer;
pub mod hmac_auth;
pub mod session;

pub use commands::{parse_command, Command};
pub use dispatcher::{Connection, ProtocolConfig};
pub use enrollment::{process_photos, EnrollmentError, QualityConfig};
pub use fragment::{fragment, reassemble, DEFAULT_FRAGMENT_BUDGET};
pub use framer::Framer;
pub use hmac_auth::{verify_command, HmacError, NonceLedger};
pub use session::{SessionError, UpsertSession};

//! The only crate in the workspace with a real Bluetooth dependency. Bridges
//! `bluer`'s GATT peripheral APIs to `faceaccess_protocol::Connection`; owns
//! no business logic of its own.

pub mod errors;
pub mod peripheral;

pub use errors::TransportError;
pub use peripheral::{serve, BleEndpoints};

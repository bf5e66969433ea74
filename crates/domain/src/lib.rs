//! # rfremote-domain
//!
//! Pure domain model for the rfremote RF bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Peripherals** (radio devices discovered during a scan)
//! - Define **RF commands** (code, band, protocol, repeat) sent to a peripheral
//! - Define **Sniffed codes** (codes captured by the peripheral's receiver)
//! - Define **Saved codes** (user-named codes kept for replay)
//! - Define the **connection state machine** (states, events, transition table)
//! - Define the **GATT profile** agreed with the peripheral firmware
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod band;
pub mod connection;
pub mod gatt;
pub mod peripheral;
pub mod rf_command;
pub mod saved_code;
pub mod sniffed_code;

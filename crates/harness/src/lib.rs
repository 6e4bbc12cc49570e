//! Simulated tapcard token and reader for protocol tests
//!
//! The pieces compose into a full fake bench:
//!
//! - [`TokenSim`] - the card, speaking the real wire protocol with real
//!   crypto
//! - [`SimTransceiver`] / [`TagHandle`] - the reader and the hand moving
//!   the card on and off it
//! - [`RecordingDelegate`] - an observer that records callbacks and
//!   answers code prompts from a script
//! - [`MemoryRepository`] - code storage over a map
//!
//! Nothing here is behind `cfg(test)`; examples and downstream crates can
//! drive a session end to end without hardware.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod card;
mod delegate;
mod repository;
mod transceiver;

pub use card::TokenSim;
pub use delegate::{DelegateEvent, RecordingDelegate};
pub use repository::MemoryRepository;
pub use transceiver::{SimTransceiver, TagHandle};

//! Freestyle Booth - record a freestyle over a beat
//!
//! This crate provides the live capture and mixing engine behind the booth:
//! a beat and the performer's microphone are mixed into one recorded take,
//! bounded to a fixed duration, and handed to the recordings API.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Session state machine, formats, device profiles, errors
//! - **Application**: Audio engine, session controller, device negotiation,
//!   submission bridge and the port interfaces (traits)
//! - **Infrastructure**: Native audio host (cpal, rodio), HTTP API clients,
//!   XDG config store
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

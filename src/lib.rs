//! ESP-Chain WiFi engine.
//!
//! The radio side of the ESP-Chain handheld multi-tool: continuous access
//! point scanning, deauthentication frame injection, promiscuous-mode
//! station discovery and handshake capture to PCAP, coordinated by a single
//! orchestrator that owns the radio's mode. For use on networks you own or
//! are authorized to test.
//!
//! Everything here is `no_std`, allocation-free and testable on any host
//! with `cargo test`. Hardware is reached only through the [`radio::Radio`],
//! [`radio::Storage`] and [`radio::Clock`] traits; the `firmware-std` binary
//! implements them over ESP-IDF.
//!
//! Layers, leaf first:
//! - `model`, `radio`, `config`: data types, capabilities, settings
//! - `scanner`, `frames`, `sniffer`, `pcap`: the engine components
//! - `attack`: the arm/disarm state machine
//! - `module`, `display`: menu UI over the orchestrator
//! - `protocol`, `comm`: NDJSON serial interface
//! - `board`: pin assignments

#![cfg_attr(not(test), no_std)]

pub mod attack;
pub mod board;
pub mod comm;
pub mod config;
pub mod display;
pub mod frames;
pub mod model;
pub mod module;
pub mod pcap;
pub mod protocol;
pub mod radio;
pub mod scanner;
pub mod sniffer;

#[cfg(test)]
mod testing;

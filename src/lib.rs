//! # Heart Rate Zones
//!
//! Heart Rate Zones listens on an MQTT topic for heart rate readings
//! sent by a smartwatch, and reports the training [`zone::Zone`] of
//! every reading it receives.

pub mod config;
pub mod listener;
pub mod mq;
pub mod telemetry;
pub mod zone;

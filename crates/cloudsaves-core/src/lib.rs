//! CloudSaves Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `Timestamp`, `RemoteId`, `RemoteFile`, `ErrorResponse`
//! - **Port definitions** - Traits for adapters: `ICloudStorage`, `ITimestampIndex`,
//!   `ISaveStore`, `ISyncStatusStore`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains plain data types with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine in `cloudsaves-sync` drives them.

pub mod config;
pub mod domain;
pub mod ports;

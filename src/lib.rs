//! proxy-fleet: run and supervise a fleet of local proxy clients.
//!
//! Each client config in a directory describes one proxy client that exposes
//! a local HTTP proxy. This crate converts proxy lists into such configs,
//! launches one client per config with bounded concurrency, keeps the
//! survivors under supervision, and stops them all within a bounded time.
//!
//! # Architecture
//!
//! - **Store**: Config directory listing, selection and parsing
//! - **Supervisor**: Client processes, their output, and group termination
//! - **Connector**: Batch fan-out with a concurrency gate
//! - **Waiter**: Blocks until interrupt or until every client exits
//! - **Convert**: YAML proxy list to client config generation
//! - **API**: Read-only HTTP discovery of the local endpoints
//! - **Config**: Layered TOML settings
//! - **Telemetry**: Structured syslog audit events

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod api;
pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod connector;
pub mod convert;
pub mod store;
pub mod supervisor;
pub mod telemetry;
pub mod waiter;

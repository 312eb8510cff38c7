//! instance-init-rs library
//!
//! This crate provides a safe Rust implementation of a boot-time instance
//! provisioning agent: on boot it fetches instance metadata from the cloud
//! platform and applies a sequence of idempotent configuration plugins to the
//! local machine.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Idempotence**: Plugin completion state persists across boots, so a
//!   plugin that reported done is never executed again
//! - **Failure Isolation**: One plugin failing never aborts the run; the
//!   plugin is retried on the next boot
//! - **Deterministic Lifecycle**: Every run ends in exactly one of reboot or
//!   orderly termination, with the metadata service released on all paths

pub mod config;
pub mod engine;
pub mod metadata;
pub mod osutils;
pub mod plugins;

mod error;

pub use error::InitError;

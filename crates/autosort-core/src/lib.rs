//! Core types for autosort.
//!
//! This crate provides the fundamental data structures shared by the rule
//! engine, the action pipeline and the folder watcher: file descriptors,
//! organize configuration and error types.

mod config;
mod descriptor;
mod error;

pub use config::{OrganizeConfig, OrganizeConfigBuilder, OrganizeConfigBuilderError};
pub use descriptor::{ColorLabel, DateField, FileDescriptor, Timestamps};
pub use error::CoreError;

//! Scriptvisor CLI library.
//!
//! This crate provides the command-line reference host for Scriptvisor.
//! The public modules are primarily exposed for testing purposes.

pub mod cli;
pub mod commands;
pub mod common;

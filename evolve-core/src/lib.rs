//! Evolve Core
//!
//! Core types shared by the Evolve server, client and CLI.
//!
//! This crate contains:
//! - Domain types: runs, run identifiers, log entries, principals
//! - DTOs: request and response bodies exchanged over the HTTP API

pub mod domain;
pub mod dto;

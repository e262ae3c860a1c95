//! Data Transfer Objects
//!
//! Request and response bodies for the Evolve HTTP API, shared by the server
//! handlers and the client.

pub mod log;
pub mod run;

//! Core domain types
//!
//! These types represent the entities the server persists or relays and the
//! client renders. They carry structure only; persistence lives in the server.

pub mod log;
pub mod principal;
pub mod run;

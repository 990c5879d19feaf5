//! Python interop module.
//!
//! This module handles all interactions with the embedded interpreter:
//! runtime probing, DataFrame transfer and the guard helpers that screen and
//! time-box code units.

pub mod conversion;
pub mod guard;
pub mod runtime;

//! Window gating and bot process supervision for wardend
//!
//! This crate is the heart of wardend, containing:
//! - Trading window evaluation (pure function of time and timezone)
//! - The supervisor state machine (WAITING -> RUNNING -> STOPPING)
//! - Graceful-stop enforcement with a bounded grace period

mod supervisor;
mod window;

pub use supervisor::*;
pub use window::*;

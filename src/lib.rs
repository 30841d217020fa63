//! bt-autolock - lock the session when idle and the companion phone is gone.
//!
//! Polls X11 idle time, optionally waits for a paired Bluetooth device to
//! disconnect, warns via a desktop notification and then runs a lock command.

pub mod autolock;
pub mod config;
pub mod domain;
pub mod idle;
pub mod lock;
pub mod notify;
pub mod proximity;

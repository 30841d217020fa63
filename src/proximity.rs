//! Companion device proximity.
//!
//! A paired Bluetooth device that stays connected is taken as "the user is
//! nearby". This module defines the probe interface the decision loop needs
//! and the composite presence check built on it.

mod bluez;

use async_trait::async_trait;
pub use bluez::BluezDevice;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Errors from the proximity subsystem.
#[derive(Error, Debug)]
pub enum ProximityError {
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("Unexpected value for property {0}")]
    BadProperty(&'static str),

    #[error("Property change stream ended")]
    StreamEnded,
}

/// Connection state of one companion device.
#[async_trait]
pub trait ProximityProbe: Send + Sync {
    /// Read the current connection state.
    async fn is_present(&self) -> Result<bool, ProximityError>;

    /// Ask the system to connect the device. Returns once the request is sent;
    /// it does not wait for the connection to be established.
    async fn request_connect(&self) -> Result<(), ProximityError>;

    /// Block until the connection state changes and return the new value.
    ///
    /// There is no timeout. The change subscription lives only as long as the
    /// returned future, so dropping it unsubscribes.
    async fn await_change(&self) -> Result<bool, ProximityError>;
}

/// Read the connection state, asking for a connection first if needed.
///
/// Connect failures are discarded; the latest read state is returned.
pub async fn try_ensure_presence<P: ProximityProbe + ?Sized>(probe: &P) -> bool {
    let connected = match probe.is_present().await {
        Ok(connected) => connected,
        Err(e) => {
            warn!("Failed to read companion connection state: {}", e);
            false
        }
    };
    if connected {
        return true;
    }

    debug!("Companion not connected, trying to connect");
    if let Err(e) = probe.request_connect().await {
        debug!("Connect request failed: {}", e);
    }

    match probe.is_present().await {
        Ok(connected) => connected,
        Err(e) => {
            warn!("Failed to read companion connection state: {}", e);
            false
        }
    }
}

/// Block until the companion disconnects.
///
/// Returns true once a disconnect is observed, false if waiting failed.
pub async fn await_departure<P: ProximityProbe + ?Sized>(probe: &P) -> bool {
    loop {
        match probe.await_change().await {
            Ok(false) => {
                info!("Companion disconnected");
                return true;
            }
            Ok(true) => debug!("Companion still connected, waiting"),
            Err(e) => {
                warn!("Failed waiting for companion disconnect: {}", e);
                return false;
            }
        }
    }
}

/// Composite presence check used by the decision loop.
///
/// If the companion is (or can be made) connected, blocks until it
/// disconnects and returns true. Otherwise returns false without blocking.
pub async fn companion_was_present<P: ProximityProbe + ?Sized>(probe: &P) -> bool {
    if !try_ensure_presence(probe).await {
        return false;
    }

    info!("Companion connected, waiting for it to leave");
    await_departure(probe).await
}

//! BlueZ companion device over the system D-Bus.
//!
//! Reads `org.bluez.Device1.Connected`, sends `Connect` requests and watches
//! `PropertiesChanged` on the device object.

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;
use tracing::info;
use zbus::Connection;
use zbus::fdo::PropertiesProxy;
use zbus::proxy;
use zbus::proxy::CacheProperties;

use super::ProximityError;
use super::ProximityProbe;
use crate::domain::DeviceAddress;

const BLUEZ_SERVICE: &str = "org.bluez";
const DEVICE_INTERFACE: &str = "org.bluez.Device1";
const CONNECTED_PROPERTY: &str = "Connected";

#[proxy(interface = "org.bluez.Device1", default_service = "org.bluez")]
trait Device1 {
    /// Request a connection. Sent without waiting for a reply.
    #[zbus(no_reply, no_autostart)]
    fn connect(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn connected(&self) -> zbus::Result<bool>;
}

/// A paired BlueZ device, identified by its object path.
pub struct BluezDevice {
    address: DeviceAddress,
    device: Device1Proxy<'static>,
    properties: PropertiesProxy<'static>,
}

impl BluezDevice {
    /// Resolve the device on `adapter` and check BlueZ knows it.
    ///
    /// Fails if the device object does not exist, which usually means it
    /// has not been paired.
    pub async fn new(
        conn: &Connection,
        address: &DeviceAddress,
        adapter: &str,
    ) -> Result<Self, ProximityError> {
        let path = address.object_path(adapter);
        debug!("Resolving companion device at {}", path);

        // Caching would hide changes between cycles; read through every time.
        let device = Device1Proxy::builder(conn)
            .path(path.clone())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;

        let properties = PropertiesProxy::builder(conn)
            .destination(BLUEZ_SERVICE)?
            .path(path)?
            .build()
            .await?;

        let this = Self {
            address: address.clone(),
            device,
            properties,
        };
        let connected = this.is_present().await?;
        info!(
            "Companion device {} found (connected={})",
            this.address, connected
        );

        Ok(this)
    }

    /// The companion's address.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }
}

#[async_trait]
impl ProximityProbe for BluezDevice {
    async fn is_present(&self) -> Result<bool, ProximityError> {
        Ok(self.device.connected().await?)
    }

    async fn request_connect(&self) -> Result<(), ProximityError> {
        debug!("Requesting connection to {}", self.address);
        Ok(self.device.connect().await?)
    }

    async fn await_change(&self) -> Result<bool, ProximityError> {
        let mut changes = self
            .properties
            .receive_properties_changed_with_args(&[(0, DEVICE_INTERFACE)])
            .await?;

        // A change between the caller's last read and the subscription would
        // otherwise never be seen.
        if !self.is_present().await? {
            return Ok(false);
        }

        while let Some(signal) = changes.next().await {
            let args = signal.args()?;
            if args.interface_name().as_str() != DEVICE_INTERFACE {
                continue;
            }
            let Some(value) = args.changed_properties().get(CONNECTED_PROPERTY) else {
                continue;
            };

            let connected = value
                .downcast_ref::<bool>()
                .map_err(|_| ProximityError::BadProperty(CONNECTED_PROPERTY))?;
            debug!("Companion {} connected={}", self.address, connected);
            return Ok(connected);
        }

        Err(ProximityError::StreamEnded)
    }
}

//! Desktop notifications over the session D-Bus.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;
use zbus::Connection;
use zbus::proxy;
use zbus::zvariant::Value;

use crate::domain::Urgency;

/// Application name and summary shown on every notification.
pub const APP_NAME: &str = "BT Autolocker";
/// Icon name shown on every notification.
pub const APP_ICON: &str = "locked";
/// Notification expiry in milliseconds.
pub const EXPIRE_TIMEOUT_MS: i32 = 5000;

#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: &HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// Errors from notification delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to deliver notification: {0}")]
    Delivery(#[from] zbus::Error),
}

/// Sends status notifications that replace each other in place.
#[async_trait]
pub trait Notifier: Send {
    /// Send `message`. A non-zero `replaces_id` replaces that notification;
    /// zero creates a new one. Returns the id to pass on the next call.
    async fn notify(
        &mut self,
        message: &str,
        urgency: Urgency,
        replaces_id: u32,
    ) -> Result<u32, NotifyError>;
}

/// Notifier talking to the desktop's notification daemon.
pub struct DesktopNotifier {
    proxy: NotificationsProxy<'static>,
}

impl DesktopNotifier {
    /// Create a notifier on the given session bus connection.
    pub async fn new(conn: &Connection) -> Result<Self, NotifyError> {
        let proxy = NotificationsProxy::new(conn).await?;
        Ok(Self { proxy })
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(
        &mut self,
        message: &str,
        urgency: Urgency,
        replaces_id: u32,
    ) -> Result<u32, NotifyError> {
        let urgency = Value::from(urgency.as_byte());
        let hints = HashMap::from([("urgency", &urgency)]);

        let id = self
            .proxy
            .notify(
                APP_NAME,
                replaces_id,
                APP_ICON,
                APP_NAME,
                message,
                &[],
                &hints,
                EXPIRE_TIMEOUT_MS,
            )
            .await?;
        trace!("Notification {} -> {}: {}", replaces_id, id, message);

        Ok(id)
    }
}

//! X11 idle probe using the MIT-SCREEN-SAVER extension.

use std::env;
use std::time::Duration;

use tracing::info;
use tracing::trace;
use x11rb::connection::Connection;
use x11rb::protocol::screensaver::ConnectionExt as _;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use super::IdleError;
use super::IdleProbe;
use super::IdleSample;
use super::ScreensaverState;

/// Idle probe backed by an X server connection.
pub struct X11IdleProbe {
    conn: RustConnection,
    root: Window,
}

impl X11IdleProbe {
    /// Connect to the display named by `$DISPLAY` and check the extension works.
    pub fn connect() -> Result<Self, IdleError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or(IdleError::NoScreen(screen_num))?
            .root;

        info!(
            "Connected to X display {}, screen {}",
            display_name(env::var("DISPLAY").ok().as_deref()),
            screen_num
        );

        let mut probe = Self { conn, root };
        probe.sample()?;
        Ok(probe)
    }
}

/// Display name as resolved from `$DISPLAY`, for logging.
fn display_name(display: Option<&str>) -> &str {
    match display {
        Some(name) if !name.is_empty() => name,
        _ => "<unset>",
    }
}

impl IdleProbe for X11IdleProbe {
    fn sample(&mut self) -> Result<IdleSample, IdleError> {
        let info = self.conn.screensaver_query_info(self.root)?.reply()?;

        let sample = IdleSample {
            since_input: Duration::from_millis(u64::from(info.ms_since_user_input)),
            screensaver: ScreensaverState::from(info.state),
        };
        trace!(
            "Idle time {:?}, screensaver {:?}",
            sample.since_input,
            sample.screensaver
        );
        Ok(sample)
    }
}

//! D-Bus integration
//!
//! Session bus connection shared by the menu importer and the statusbar
//! service.

use anyhow::{Context, Result};
use zbus::Connection;

pub mod dbusmenu;
pub mod statusbar;

pub struct DbusManager {
    conn: Connection,
}

impl DbusManager {
    /// Connect to session D-Bus
    pub async fn new() -> Result<Self> {
        let conn = Connection::session()
            .await
            .context("Failed to connect to D-Bus session bus")?;

        tracing::info!("Connected to D-Bus session bus");

        Ok(Self { conn })
    }

    /// Get connection (for creating proxies). Cloning is cheap.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

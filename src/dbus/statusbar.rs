//! `com.cutefish.Statusbar` service
//!
//! Lets the settings application flip bar options at runtime. Calls are
//! forwarded to the main loop as [`ShellCommand`]s.

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use zbus::{interface, Connection};

pub const SERVICE_NAME: &str = "com.cutefish.Statusbar";
pub const OBJECT_PATH: &str = "/Statusbar";

/// Requests from outside the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    SetTwentyFourTime(bool),
    SetBatteryPercentage(bool),
}

pub struct StatusbarService {
    twenty_four_time: bool,
    battery_percentage: bool,
    commands: UnboundedSender<ShellCommand>,
}

impl StatusbarService {
    pub fn new(
        twenty_four_time: bool,
        battery_percentage: bool,
        commands: UnboundedSender<ShellCommand>,
    ) -> Self {
        Self {
            twenty_four_time,
            battery_percentage,
            commands,
        }
    }

    fn forward(&self, command: ShellCommand) {
        debug!("D-Bus request: {:?}", command);
        let _ = self.commands.send(command);
    }
}

#[interface(name = "com.cutefish.Statusbar")]
impl StatusbarService {
    #[zbus(name = "setTwentyFourTime")]
    fn set_twenty_four_time(&mut self, enabled: bool) {
        self.twenty_four_time = enabled;
        self.forward(ShellCommand::SetTwentyFourTime(enabled));
    }

    #[zbus(name = "setBatteryPercentage")]
    fn set_battery_percentage(&mut self, enabled: bool) {
        self.battery_percentage = enabled;
        self.forward(ShellCommand::SetBatteryPercentage(enabled));
    }

    #[zbus(property, name = "twentyFourTime")]
    fn twenty_four_time(&self) -> bool {
        self.twenty_four_time
    }

    #[zbus(property, name = "batteryPercentage")]
    fn battery_percentage(&self) -> bool {
        self.battery_percentage
    }
}

/// Export the service and claim its well-known name
pub async fn serve(conn: &Connection, service: StatusbarService) -> Result<()> {
    conn.object_server()
        .at(OBJECT_PATH, service)
        .await
        .context("Failed to export statusbar object")?;
    conn.request_name(SERVICE_NAME)
        .await
        .context("Failed to own statusbar bus name")?;

    info!("Serving {} at {}", SERVICE_NAME, OBJECT_PATH);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_setters_forward_commands() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut service = StatusbarService::new(false, false, tx);

        service.set_twenty_four_time(true);
        service.set_battery_percentage(true);

        assert!(service.twenty_four_time());
        assert!(service.battery_percentage());
        assert_eq!(rx.try_recv().unwrap(), ShellCommand::SetTwentyFourTime(true));
        assert_eq!(rx.try_recv().unwrap(), ShellCommand::SetBatteryPercentage(true));
        assert!(rx.try_recv().is_err());
    }
}

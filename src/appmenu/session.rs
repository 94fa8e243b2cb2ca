//! One DBusMenu import session
//!
//! A spawned task owns the proxy and its signal streams and reports back to
//! the main loop through [`MenuEvent`]s. Dropping the [`MenuSession`] aborts
//! the task.

use futures_util::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::proxy::CacheProperties;
use zbus::zvariant::Value;
use zbus::Connection;

use super::model::{MenuEndpoint, MenuEvent, MenuEventKind};
use crate::dbus::dbusmenu::{child_entries, DBusMenuProxy, MenuEntry, PropertyPatch};

/// Root item of every exported menu
const ROOT_ID: i32 = 0;

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("menu service {0} has no owner")]
    NoOwner(String),
    #[error("menu service {0} left the bus")]
    ServiceLost(String),
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),
    #[error("D-Bus call failed: {0}")]
    Call(#[from] zbus::fdo::Error),
}

/// Requests from the shell to the session task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Re-import the top level if the application says it changed
    Refresh,
    /// Send `clicked`; for submenus also load and report the children
    Activate { id: i32, submenu: bool, timestamp: u32 },
}

/// Shell side of the command link. Refreshes collapse into a single
/// pending wake-up; activations are queued in order.
#[derive(Debug, Clone)]
pub struct CommandSender {
    commands: UnboundedSender<SessionCommand>,
    refresh: Arc<Notify>,
}

impl CommandSender {
    pub fn send(&self, command: SessionCommand) {
        match command {
            SessionCommand::Refresh => self.refresh.notify_one(),
            command => {
                let _ = self.commands.send(command);
            }
        }
    }
}

/// Session side of the command link
#[derive(Debug)]
pub struct CommandReceiver {
    commands: UnboundedReceiver<SessionCommand>,
    refresh: Arc<Notify>,
}

impl CommandReceiver {
    /// Next command; `None` once the shell side is gone
    pub async fn recv(&mut self) -> Option<SessionCommand> {
        tokio::select! {
            biased;
            command = self.commands.recv() => command,
            () = self.refresh.notified() => Some(SessionCommand::Refresh),
        }
    }
}

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (commands, rx) = mpsc::unbounded_channel();
    let refresh = Arc::new(Notify::new());
    (
        CommandSender {
            commands,
            refresh: refresh.clone(),
        },
        CommandReceiver { commands: rx, refresh },
    )
}

pub struct MenuSession {
    commands: CommandSender,
    task: JoinHandle<()>,
}

impl MenuSession {
    pub fn spawn(
        bus: Connection,
        endpoint: MenuEndpoint,
        generation: u64,
        events: UnboundedSender<MenuEvent>,
    ) -> Self {
        let (commands, rx) = command_channel();
        let task = tokio::spawn(async move {
            let kind = match run(&bus, &endpoint, generation, rx, &events).await {
                Ok(()) => return,
                Err(MenuError::ServiceLost(service)) => {
                    info!("Menu service {} disappeared", service);
                    MenuEventKind::ServiceLost
                }
                Err(e) => {
                    warn!("Menu session for {} failed: {}", endpoint.service, e);
                    MenuEventKind::Failed(e.to_string())
                }
            };
            let _ = events.send(MenuEvent { generation, kind });
        });

        Self { commands, task }
    }

    pub fn send(&self, command: SessionCommand) {
        self.commands.send(command);
    }
}

impl Drop for MenuSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn import(proxy: &DBusMenuProxy<'_>, parent: i32) -> Result<Vec<MenuEntry>, MenuError> {
    let (revision, layout) = proxy.get_layout(parent, 1, &[]).await?;
    let entries = child_entries(&layout);
    debug!(
        "Imported {} entries under {} (revision {})",
        entries.len(),
        parent,
        revision
    );
    Ok(entries)
}

/// Re-read the top level; a failed read keeps the entries already shown
async fn reimport(proxy: &DBusMenuProxy<'_>, send: &impl Fn(MenuEventKind)) {
    match import(proxy, ROOT_ID).await {
        Ok(entries) => send(MenuEventKind::LayoutImported(entries)),
        Err(e) => warn!("Failed to re-import menu layout: {}", e),
    }
}

async fn about_to_show(proxy: &DBusMenuProxy<'_>, id: i32) -> bool {
    match proxy.about_to_show(id).await {
        Ok(needs_update) => needs_update,
        Err(e) => {
            // Not every exporter implements it
            debug!("AboutToShow({}) failed: {}", id, e);
            false
        }
    }
}

async fn run(
    bus: &Connection,
    endpoint: &MenuEndpoint,
    generation: u64,
    mut commands: CommandReceiver,
    events: &UnboundedSender<MenuEvent>,
) -> Result<(), MenuError> {
    let send = |kind: MenuEventKind| {
        let _ = events.send(MenuEvent { generation, kind });
    };

    let dbus = DBusProxy::new(bus).await?;
    let name = BusName::try_from(endpoint.service.as_str()).map_err(zbus::Error::from)?;
    let mut owner_changes = dbus
        .receive_name_owner_changed_with_args(&[(0, endpoint.service.as_str())])
        .await?;
    if !dbus.name_has_owner(name).await? {
        return Err(MenuError::NoOwner(endpoint.service.clone()));
    }

    let proxy = DBusMenuProxy::builder(bus)
        .destination(endpoint.service.as_str())?
        .path(endpoint.path.as_str())?
        .cache_properties(CacheProperties::No)
        .build()
        .await?;

    let mut layout_updates = proxy.receive_layout_updated().await?;
    let mut property_updates = proxy.receive_items_properties_updated().await?;
    let mut activation_requests = proxy.receive_item_activation_requested().await?;

    about_to_show(&proxy, ROOT_ID).await;
    send(MenuEventKind::LayoutImported(import(&proxy, ROOT_ID).await?));

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    return Ok(());
                };
                match command {
                    SessionCommand::Refresh => {
                        if about_to_show(&proxy, ROOT_ID).await {
                            reimport(&proxy, &send).await;
                        }
                    }
                    SessionCommand::Activate { id, submenu, timestamp } => {
                        if submenu {
                            about_to_show(&proxy, id).await;
                        }
                        if let Err(e) = proxy.event(id, "clicked", &Value::from(0i32), timestamp).await {
                            warn!("Event(clicked) for menu item {} failed: {}", id, e);
                        }
                        if submenu {
                            match import(&proxy, id).await {
                                Ok(entries) => send(MenuEventKind::SubmenuLoaded { parent: id, entries }),
                                Err(e) => warn!("Failed to load submenu {}: {}", id, e),
                            }
                        }
                    }
                }
            }

            Some(signal) = layout_updates.next() => {
                match signal.args() {
                    Ok(args) => debug!("LayoutUpdated revision {} parent {}", args.revision(), args.parent()),
                    Err(e) => debug!("Malformed LayoutUpdated: {}", e),
                }
                reimport(&proxy, &send).await;
            }

            Some(signal) = property_updates.next() => {
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(e) => {
                        warn!("Malformed ItemsPropertiesUpdated: {}", e);
                        continue;
                    }
                };
                let patches: Vec<PropertyPatch> = args
                    .updated_props()
                    .iter()
                    .map(|(id, properties)| PropertyPatch::from_properties(*id, properties))
                    .chain(
                        args.removed_props()
                            .iter()
                            .map(|(id, names)| PropertyPatch::removed(*id, names)),
                    )
                    .collect();
                send(MenuEventKind::PropertiesUpdated(patches));
            }

            Some(signal) = activation_requests.next() => {
                match signal.args() {
                    Ok(args) => send(MenuEventKind::ActivationRequested(*args.id())),
                    Err(e) => warn!("Malformed ItemActivationRequested: {}", e),
                }
            }

            signal = owner_changes.next() => {
                let Some(signal) = signal else {
                    return Err(MenuError::ServiceLost(endpoint.service.clone()));
                };
                if signal.args().map(|args| args.new_owner().is_none()).unwrap_or(false) {
                    return Err(MenuError::ServiceLost(endpoint.service.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    #[tokio::test]
    async fn test_refreshes_coalesce_while_stalled() {
        let (sender, mut receiver) = command_channel();
        for _ in 0..150 {
            sender.send(SessionCommand::Refresh);
        }

        assert_eq!(receiver.recv().await, Some(SessionCommand::Refresh));
        assert_eq!(receiver.recv().now_or_never(), None);
    }

    #[tokio::test]
    async fn test_activations_keep_their_order() {
        let (sender, mut receiver) = command_channel();
        let open = |id| SessionCommand::Activate {
            id,
            submenu: true,
            timestamp: 0,
        };
        sender.send(SessionCommand::Refresh);
        sender.send(open(1));
        sender.send(SessionCommand::Refresh);
        sender.send(open(2));

        assert_eq!(receiver.recv().await, Some(open(1)));
        assert_eq!(receiver.recv().await, Some(open(2)));
        assert_eq!(receiver.recv().await, Some(SessionCommand::Refresh));
        assert_eq!(receiver.recv().now_or_never(), None);
    }

    #[tokio::test]
    async fn test_receiver_ends_with_sender() {
        let (sender, mut receiver) = command_channel();
        drop(sender);
        assert_eq!(receiver.recv().await, None);
    }
}

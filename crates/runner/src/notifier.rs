use geotrackr_ports::{DispatchError, Notification, NotificationKind, Notifier};
use log::info;

/// Writes notifications to the log; the terminal host has no other surface
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), DispatchError> {
        let tag = match notification.kind {
            NotificationKind::ZoneEnter => "ENTER",
            NotificationKind::ZoneExit => "EXIT",
            NotificationKind::System => "NOTICE",
        };
        info!("[{}] {}: {}", tag, notification.title, notification.body);
        Ok(())
    }
}

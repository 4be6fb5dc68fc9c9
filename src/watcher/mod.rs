use std::{collections::HashMap, io};

use inotify::{EventMask, Inotify, WatchMask};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Create { name: String, base_path: String },
    Delete { name: String, base_path: String },
}

/// Watch for filesystem changes on the given paths, sending [WatchEvent]
/// to the given channel. Blocks until the receiving side of the channel is
/// closed.
pub fn watch(paths: Vec<String>, tx: Sender<WatchEvent>) -> Result<(), io::Error> {
    let mut inotify = Inotify::init()?;
    let mut watched = HashMap::new();
    for path in paths {
        let descriptor = inotify
            .watches()
            .add(path.clone(), WatchMask::CREATE | WatchMask::DELETE)?;
        log::debug!("Watching {path}");
        watched.insert(descriptor, path);
    }

    // Listen for watch events
    let mut buffer = [0u8; 4096];
    loop {
        let events = inotify.read_events_blocking(&mut buffer)?;

        for event in events {
            let Some(name) = event.name.map(|name| name.to_string_lossy().to_string()) else {
                continue;
            };
            let Some(path) = watched.get(&event.wd) else {
                continue;
            };

            let value = if event.mask.contains(EventMask::CREATE) {
                log::debug!("inotify CREATE: {path}/{name}");
                WatchEvent::Create {
                    name,
                    base_path: path.clone(),
                }
            } else if event.mask.contains(EventMask::DELETE) {
                log::debug!("inotify DELETE: {path}/{name}");
                WatchEvent::Delete {
                    name,
                    base_path: path.clone(),
                }
            } else {
                log::trace!("inotify {:?}: {name}", event.mask);
                continue;
            };

            // Send the event over our channel
            if let Err(e) = tx.blocking_send(value) {
                log::debug!("Stopping watcher: {e}");
                return Ok(());
            }
        }
    }
}

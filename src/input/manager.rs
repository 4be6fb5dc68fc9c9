use std::{collections::HashMap, error::Error};

use tokio::sync::mpsc;

use crate::{
    config::Config,
    drivers::{self, ultimate_2c::session::Session},
    udev::device::UdevDevice,
    watcher,
};

const BUFFER_SIZE: usize = 1024;

/// Manager commands define all the different ways to interact with [Manager]
/// over a channel. These commands are processed in an asyncronous thread and
/// dispatched as they come in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    UsbDeviceAdded { name: String, base_path: String },
    UsbDeviceRemoved { name: String, base_path: String },
    Stop,
}

/// Attaches a session to every supported gamepad that shows up as a USB
/// device node and detaches it again when the device goes away.
///
/// Commands are handled one at a time, so a device node is never attached
/// again before the session of its previous attachment has been freed.
pub struct Manager {
    config: Config,
    /// The transmit side of the [rx] channel used to send [Command] messages.
    tx: mpsc::Sender<Command>,
    /// The receive side of the channel used to listen for [Command] messages
    rx: mpsc::Receiver<Command>,
    /// Attached gamepads by device node, e.g. {"/dev/bus/usb/001/005": <Session>}
    sessions: HashMap<String, Session>,
}

impl Manager {
    pub fn new(config: Config) -> Manager {
        let (tx, rx) = mpsc::channel(BUFFER_SIZE);
        Manager {
            config,
            tx,
            rx,
            sessions: HashMap::new(),
        }
    }

    /// Returns a transmitter channel that can be used to send commands to
    /// this manager
    pub fn transmitter(&self) -> mpsc::Sender<Command> {
        self.tx.clone()
    }

    /// Starts listening for [Command] messages and dispatches them until a
    /// [Command::Stop] is received. All sessions are detached before this
    /// returns.
    pub async fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.watch_usb_devices()?;

        while let Some(cmd) = self.rx.recv().await {
            log::debug!("Received command: {cmd:?}");
            match cmd {
                Command::UsbDeviceAdded { name, base_path } => {
                    self.on_usb_device_added(name, base_path).await
                }
                Command::UsbDeviceRemoved { name, base_path } => {
                    self.on_usb_device_removed(name, base_path).await
                }
                Command::Stop => break,
            }
        }

        self.detach_all().await;
        Ok(())
    }

    /// Called when a USB device node (e.g. /dev/bus/usb/001/005) is added
    async fn on_usb_device_added(&mut self, name: String, base_path: String) {
        let devnode = format!("{base_path}/{name}");
        log::debug!("USB device added: {devnode}");
        if self.sessions.contains_key(&devnode) {
            log::debug!("Device {devnode} is already attached");
            return;
        }

        let udevice = UdevDevice::from_devnode(base_path.as_str(), name.as_str());
        let vendor_id = udevice.id_vendor();
        let product_id = udevice.id_product();
        let Some(driver) = drivers::find_driver(vendor_id, product_id) else {
            log::trace!("No driver for {devnode} ({vendor_id:04x}:{product_id:04x})");
            return;
        };

        log::debug!("Attaching {devnode} with driver {driver:?}");
        match (driver.attach)(&udevice, &self.config).await {
            Ok(session) => {
                self.sessions.insert(devnode, session);
            }
            Err(e) => log::error!("Unable to attach {devnode}: {e}"),
        }
    }

    /// Called when a USB device node (e.g. /dev/bus/usb/001/005) is removed
    async fn on_usb_device_removed(&mut self, name: String, base_path: String) {
        let devnode = format!("{base_path}/{name}");
        log::debug!("USB device removed: {devnode}");
        let Some(mut session) = self.sessions.remove(&devnode) else {
            return;
        };
        session.detach().await;
    }

    async fn detach_all(&mut self) {
        for (devnode, mut session) in self.sessions.drain() {
            log::info!("Detaching {devnode}");
            session.detach().await;
        }
    }

    /// Starts watching every USB bus directory for device nodes that are
    /// added and removed.
    fn watch_usb_devices(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let bus_paths: Vec<String> = list_device_names(&self.config.watch_path)?
            .into_iter()
            .map(|bus| format!("{}/{bus}", self.config.watch_path))
            .collect();

        // Create a channel to handle watch events
        let (watcher_tx, mut watcher_rx) = mpsc::channel(BUFFER_SIZE);

        // Start watcher thread to listen for USB device changes
        let paths = bus_paths.clone();
        tokio::task::spawn_blocking(move || {
            log::debug!("Started watcher thread for {paths:?}");
            if let Err(e) = watcher::watch(paths, watcher_tx) {
                log::error!("Unable to watch USB buses: {e}");
            }
        });

        // Perform an initial USB device discovery
        for base_path in bus_paths {
            let names = match list_device_names(&base_path) {
                Ok(names) => names,
                Err(e) => {
                    log::warn!("Unable to read from directory {base_path}: {e:?}");
                    continue;
                }
            };
            for name in names {
                log::debug!("Discovered USB device: {base_path}/{name}");
                let cmd = Command::UsbDeviceAdded {
                    name,
                    base_path: base_path.clone(),
                };
                if let Err(e) = self.tx.try_send(cmd) {
                    log::error!("Unable to send command: {e:?}");
                }
            }
        }

        // Start a task to dispatch filesystem watch events to the `run()` loop
        let cmd_tx = self.tx.clone();
        tokio::spawn(async move {
            log::debug!("Dispatching filesystem watch events");
            while let Some(event) = watcher_rx.recv().await {
                log::trace!("Received watch event: {event:?}");
                let Some(cmd) = command_for(event) else {
                    continue;
                };
                if let Err(e) = cmd_tx.send(cmd).await {
                    log::debug!("Manager stopped: {e}");
                    break;
                }
            }
        });

        Ok(())
    }
}

/// Returns true if the given directory entry name is a USB bus or device
/// number, e.g. "001"
pub fn is_usb_node_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Sorted names of the numbered entries in the given directory
fn list_device_names(path: &str) -> Result<Vec<String>, std::io::Error> {
    let mut names = vec![];
    for entry in std::fs::read_dir(path)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Unable to read from directory: {e:?}");
                continue;
            }
        };
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_usb_node_name(&name) {
            names.push(name);
        }
    }
    names.sort();

    Ok(names)
}

/// Returns the command for the given watch event, if it concerns a USB
/// device node
pub fn command_for(event: watcher::WatchEvent) -> Option<Command> {
    match event {
        watcher::WatchEvent::Create { name, base_path } if is_usb_node_name(&name) => {
            Some(Command::UsbDeviceAdded { name, base_path })
        }
        watcher::WatchEvent::Delete { name, base_path } if is_usb_node_name(&name) => {
            Some(Command::UsbDeviceRemoved { name, base_path })
        }
        _ => None,
    }
}

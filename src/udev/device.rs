use std::{
    error::Error,
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use crate::transport::{Direction, EndpointDescriptor, TransferType};

/// Directory the kernel creates USB device nodes in
pub const USB_DEVNODE_ROOT: &str = "/dev/bus/usb";

#[derive(Debug, Clone, Default)]
pub struct UdevDevice {
    devnode: String,
    subsystem: String,
    syspath: String,
}

impl UdevDevice {
    /// Returns a UdevDevice object from the given base path and name.
    /// e.g. UdevDevice::from_devnode("/dev/bus/usb/001", "005");
    pub fn from_devnode(base_path: &str, name: &str) -> Self {
        let devnode = format!("{base_path}/{name}");

        // Look up the syspath so attributes can be read
        if let Some(device) = find_by_devnode("usb", devnode.as_str()) {
            return UdevDevice::from(device);
        }

        Self {
            devnode,
            subsystem: "usb".to_string(),
            syspath: "".to_string(),
        }
    }

    /// returns a udev::Device from the stored syspath.
    pub fn get_device(&self) -> Result<::udev::Device, Box<dyn Error + Send + Sync>> {
        match ::udev::Device::from_syspath(Path::new(self.syspath.as_str())) {
            Ok(device) => Ok(device),
            Err(e) => Err(e.into()),
        }
    }

    pub fn devnode(&self) -> String {
        self.devnode.clone()
    }

    pub fn id_product(&self) -> u16 {
        let Ok(device) = self.get_device() else {
            return 0;
        };
        parse_hex(&get_attribute_from_tree(&device, "idProduct"))
    }

    pub fn id_vendor(&self) -> u16 {
        let Ok(device) = self.get_device() else {
            return 0;
        };
        parse_hex(&get_attribute_from_tree(&device, "idVendor"))
    }

    /// Device release number of the USB device
    pub fn id_version(&self) -> u16 {
        let Ok(device) = self.get_device() else {
            return 0;
        };
        parse_hex(&get_attribute_from_tree(&device, "bcdDevice"))
    }

    pub fn manufacturer(&self) -> String {
        let Ok(device) = self.get_device() else {
            return "".to_string();
        };
        get_attribute_from_tree(&device, "manufacturer")
    }

    pub fn product(&self) -> String {
        let Ok(device) = self.get_device() else {
            return "".to_string();
        };
        get_attribute_from_tree(&device, "product")
    }

    /// Bus number of the USB device
    pub fn busnum(&self) -> u8 {
        let Ok(device) = self.usb_device() else {
            return 0;
        };
        get_attribute_from_tree(&device, "busnum").parse().unwrap_or(0)
    }

    /// Address of the USB device on its bus
    pub fn devnum(&self) -> u8 {
        let Ok(device) = self.usb_device() else {
            return 0;
        };
        get_attribute_from_tree(&device, "devnum").parse().unwrap_or(0)
    }

    /// Returns the USB device this device is, or belongs to
    pub fn usb_device(&self) -> Result<::udev::Device, Box<dyn Error + Send + Sync>> {
        let device = self.get_device()?;
        if self.subsystem == "usb" && device.devtype() == Some(OsStr::new("usb_device")) {
            return Ok(device);
        }
        match device.parent_with_subsystem_devtype("usb", "usb_device")? {
            Some(parent) => Ok(parent),
            None => Err(format!("{} is not a USB device", self.devnode).into()),
        }
    }

    /// Physical path of the USB device in the form the kernel uses,
    /// e.g. "usb-0000:00:14.0-2"
    pub fn usb_path(&self) -> String {
        let Ok(usb_device) = self.usb_device() else {
            return "".to_string();
        };
        let devpath = usb_device
            .attribute_value("devpath")
            .unwrap_or(OsStr::new(""))
            .to_string_lossy()
            .to_string();

        // The bus is named after the host controller above the root hub
        let mut hub = usb_device;
        while let Some(parent) = hub.parent() {
            if parent.devtype() != Some(OsStr::new("usb_device")) {
                let bus = parent.sysname().to_string_lossy().to_string();
                return format!("usb-{bus}-{devpath}");
            }
            hub = parent;
        }

        format!("usb-{devpath}")
    }

    /// Interfaces of the active configuration, read from the interface
    /// directories (e.g. "1-2:1.0") of the USB device in sysfs.
    pub fn usb_interfaces(&self) -> Vec<UsbInterface> {
        let Ok(usb_device) = self.usb_device() else {
            log::debug!("No USB device found for {}", self.devnode);
            return vec![];
        };
        let prefix = format!("{}:", usb_device.sysname().to_string_lossy());
        let Ok(entries) = fs::read_dir(usb_device.syspath()) else {
            return vec![];
        };

        let mut interfaces: Vec<UsbInterface> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .filter_map(|entry| {
                let path = entry.path();
                let number = read_attribute(&path, "bInterfaceNumber");
                let class = read_attribute(&path, "bInterfaceClass");
                interface_from_attributes(&number, &class, path)
            })
            .collect();
        interfaces.sort_by_key(|interface| interface.number);

        interfaces
    }
}

/// One interface of a USB device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbInterface {
    pub number: u8,
    pub class: u8,
    /// sysfs directory of the interface
    pub path: PathBuf,
}

impl UsbInterface {
    /// Endpoints advertised by this interface. Read from its ep_XX
    /// directories in sysfs.
    pub fn endpoints(&self) -> Vec<EndpointDescriptor> {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return vec![];
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with("ep_"))
                    .unwrap_or_default()
            })
            .collect();
        paths.sort();

        paths
            .iter()
            .filter_map(|path| {
                endpoint_from_attributes(
                    &read_attribute(path, "bEndpointAddress"),
                    &read_attribute(path, "bInterval"),
                    &read_attribute(path, "type"),
                    &read_attribute(path, "direction"),
                )
            })
            .collect()
    }
}

/// Build an interface from its sysfs attributes. Both are hex strings,
/// e.g. "00" and "ff".
pub fn interface_from_attributes(number: &str, class: &str, path: PathBuf) -> Option<UsbInterface> {
    Some(UsbInterface {
        number: u8::from_str_radix(number, 16).ok()?,
        class: u8::from_str_radix(class, 16).ok()?,
        path,
    })
}

fn read_attribute(path: &Path, name: &str) -> String {
    fs::read_to_string(path.join(name))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Find the device of the given subsystem that owns the device node
fn find_by_devnode(subsystem: &str, devnode: &str) -> Option<::udev::Device> {
    let mut enumerator = ::udev::Enumerator::new().ok()?;
    enumerator.match_subsystem(subsystem).ok()?;
    let devices = enumerator.scan_devices().ok()?;
    devices
        .into_iter()
        .find(|device| device.devnode() == Some(Path::new(devnode)))
}

/// Build an endpoint descriptor from its sysfs attributes. The address and
/// interval are hex strings, e.g. "81" and "01".
pub fn endpoint_from_attributes(
    address: &str,
    interval: &str,
    kind: &str,
    direction: &str,
) -> Option<EndpointDescriptor> {
    let address = u8::from_str_radix(address, 16).ok()?;
    let interval = u8::from_str_radix(interval, 16).unwrap_or(0);
    let transfer_type = match kind {
        "Control" => TransferType::Control,
        "Isoc" => TransferType::Isochronous,
        "Bulk" => TransferType::Bulk,
        "Interrupt" => TransferType::Interrupt,
        _ => return None,
    };
    let direction = match direction {
        "in" => Direction::In,
        "out" => Direction::Out,
        // Control endpoints go both ways
        _ => return None,
    };

    Some(EndpointDescriptor {
        address,
        transfer_type,
        direction,
        interval,
    })
}

fn parse_hex(value: &str) -> u16 {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u16::from_str_radix(stripped, 16).unwrap_or(0)
}

/// Gets an attribute from the first device in the device tree to match the attribute.
pub fn get_attribute_from_tree(device: &::udev::Device, attribute: &str) -> String {
    // Check if the current device has this attribute
    let attr = match device.attribute_value(attribute) {
        Some(attr) => attr,
        None => {
            if let Some(parent) = device.parent() {
                return get_attribute_from_tree(&parent, attribute);
            } else {
                return "".to_string();
            };
        }
    };
    attr.to_string_lossy().to_string()
}

impl From<::udev::Device> for UdevDevice {
    fn from(device: ::udev::Device) -> Self {
        let devnode = device
            .devnode()
            .unwrap_or(Path::new(""))
            .to_string_lossy()
            .to_string();
        let subsystem = device
            .subsystem()
            .unwrap_or(OsStr::new(""))
            .to_string_lossy()
            .to_string();
        let syspath = device.syspath().to_string_lossy().to_string();

        Self {
            devnode,
            subsystem,
            syspath,
        }
    }
}

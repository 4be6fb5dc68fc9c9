//! Module for searching for config files

use std::path::PathBuf;

/// Name of the config file in each search path
pub const CONFIG_FILE: &str = "config.yaml";

/// Returns a list of config file paths in load order.
/// E.g. ["~/.config/u2cw/config.yaml", "/etc/u2cw/config.yaml"]
pub fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![];
    match xdg::BaseDirectories::with_prefix("u2cw") {
        Ok(base_dirs) => paths.push(base_dirs.get_config_home().join(CONFIG_FILE)),
        Err(e) => log::warn!("Unable to determine config base path: {e}"),
    }
    paths.push(PathBuf::from("/etc/u2cw").join(CONFIG_FILE));
    paths.push(PathBuf::from("./rootfs/etc/u2cw").join(CONFIG_FILE));

    paths
}

/// Returns the first config file that exists
pub fn get_config_path() -> Option<PathBuf> {
    get_config_paths().into_iter().find(|path| {
        log::trace!("Checking {path:?} for config");
        path.is_file()
    })
}

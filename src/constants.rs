/// Name of the virtual gamepad
pub const GAMEPAD_NAME: &str = "8BitDo Ultimate 2C";
/// Name the driver reports itself with
pub const DRIVER_NAME: &str = "8bd-u2cw";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

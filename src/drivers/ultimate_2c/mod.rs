pub mod driver;
pub mod event;
pub mod hid_report;
pub mod macros;
pub mod scheduler;
pub mod session;
pub mod state;

#[cfg(test)]
mod driver_test;
#[cfg(test)]
mod hid_report_test;
#[cfg(test)]
mod state_test;

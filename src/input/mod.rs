pub mod manager;
pub mod target;

//! Port traits: what the fetch layer needs from the outside world.

pub mod config_port;
pub mod store_port;

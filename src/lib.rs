//! Send magnet links, info-hashes and `.torrent` links to a Transmission
//! daemon over its JSON RPC interface.

pub mod actions;
pub mod config;
pub mod model;
pub mod ports;
pub mod reference;
pub mod rpc;

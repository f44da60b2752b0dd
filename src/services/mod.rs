//! Network configuration services
//!
//! Stateless operations on top of a [`NetworkClient`](crate::network_client::NetworkClient).
//! They know nothing about menus, so they can be tested against any client.

pub mod network;
pub mod wifi;

pub mod config;
pub mod engine;
pub mod menu_id;
pub mod menu_registry;
pub mod network_client;
pub mod nmcli_client;
pub mod protocol;
pub mod services;
pub mod session;

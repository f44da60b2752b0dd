#![cfg_attr(feature = "mock", allow(dead_code, unused_imports))]

use anyhow::{Context, Result, anyhow};
#[cfg(feature = "mock")]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::{fmt, net::Ipv4Addr, str::FromStr};
use trait_variant::make;

pub const DEFAULT_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 123, 234);
pub const DEFAULT_PREFIX: u8 = 24;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Wifi,
    Other,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Unmanaged,
    Unavailable,
    Disconnected,
    Connecting,
    Connected,
    Deactivating,
    Failed,
    Unknown,
}

impl DeviceState {
    /// Short label that fits next to an interface name on a 20 column display
    pub fn label(self) -> &'static str {
        match self {
            DeviceState::Unmanaged => "unmanaged",
            DeviceState::Unavailable => "n/a",
            DeviceState::Disconnected => "down",
            DeviceState::Connecting => "conn...",
            DeviceState::Connected => "up",
            DeviceState::Deactivating => "disc...",
            DeviceState::Failed => "failed",
            DeviceState::Unknown => "?",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct InterfaceState {
    pub name: String,
    pub kind: InterfaceKind,
    pub state: DeviceState,
    /// name of the active connection profile
    pub active_connection: Option<String>,
    /// SSID of the associated access point (Wi-Fi only)
    pub active_ssid: Option<String>,
}

impl InterfaceState {
    /// Interfaces shown in the menu: Ethernet or Wi-Fi and managed
    pub fn is_managed(&self) -> bool {
        self.kind != InterfaceKind::Other && self.state != DeviceState::Unmanaged
    }

    /// Main menu label, e.g. `eth0 up`
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.state.label())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct AccessPoint {
    /// stable per scan, safe to embed into menu ids
    pub handle: String,
    pub ssid: String,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, Validate)]
pub struct Ipv4Address {
    pub ip: Ipv4Addr,
    #[validate(maximum = 32)]
    pub prefix: u8,
}

impl Default for Ipv4Address {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP,
            prefix: DEFAULT_PREFIX,
        }
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix)
    }
}

impl FromStr for Ipv4Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (ip, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow!("failed to parse address {s:?}: missing prefix"))?;

        let address = Ipv4Address {
            ip: ip.parse().context(format!("failed to parse ip {ip:?}"))?,
            prefix: prefix
                .parse()
                .context(format!("failed to parse prefix {prefix:?}"))?,
        };

        address
            .validate()
            .context(format!("failed to parse address {s:?}"))?;

        Ok(address)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ipv4Method {
    #[default]
    Auto,
    Manual,
    /// any other NetworkManager method (`link-local`, `shared`, `disabled`)
    Other(String),
}

impl Ipv4Method {
    pub fn parse(value: &str) -> Self {
        match value {
            "auto" => Ipv4Method::Auto,
            "manual" => Ipv4Method::Manual,
            other => Ipv4Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Ipv4Method::Auto => "auto",
            Ipv4Method::Manual => "manual",
            Ipv4Method::Other(other) => other,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct Ipv4Settings {
    pub method: Ipv4Method,
    /// treated as a single address that is replaced as a whole
    pub addresses: Vec<Ipv4Address>,
}

impl Ipv4Settings {
    pub fn is_dhcp(&self) -> bool {
        self.method == Ipv4Method::Auto
    }

    pub fn first_address(&self) -> Option<Ipv4Address> {
        self.addresses.first().copied()
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Wired,
    Wireless,
    Other(String),
}

#[derive(Clone, Deserialize, PartialEq, Eq, Serialize)]
pub struct ConnectionProfile {
    pub name: String,
    /// `None` until the profile was persisted
    pub uuid: Option<String>,
    pub kind: ConnectionKind,
    pub interface_name: Option<String>,
    pub autoconnect: bool,
    pub ssid: Option<String>,
    pub ipv4: Ipv4Settings,
    /// WPA-PSK passphrase, `None` for open networks
    pub psk: Option<String>,
}

impl ConnectionProfile {
    /// Wired profile named after its interface with automatic addressing
    pub fn wired(interface_name: &str) -> Self {
        Self {
            name: interface_name.to_string(),
            uuid: None,
            kind: ConnectionKind::Wired,
            interface_name: Some(interface_name.to_string()),
            autoconnect: true,
            ssid: None,
            ipv4: Ipv4Settings::default(),
            psk: None,
        }
    }

    /// Wireless profile named after its SSID
    pub fn wireless(ssid: &str, interface_name: &str) -> Self {
        Self {
            name: ssid.to_string(),
            uuid: None,
            kind: ConnectionKind::Wireless,
            interface_name: Some(interface_name.to_string()),
            autoconnect: true,
            ssid: Some(ssid.to_string()),
            ipv4: Ipv4Settings::default(),
            psk: None,
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("kind", &self.kind)
            .field("interface_name", &self.interface_name)
            .field("autoconnect", &self.autoconnect)
            .field("ssid", &self.ssid)
            .field("ipv4", &self.ipv4)
            .field("psk", &self.psk.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Network management capabilities the menu engine relies on
///
/// All calls may be slow and may fail; callers log failures and carry on.
#[make(Send)]
#[cfg_attr(feature = "mock", automock)]
pub trait NetworkClient {
    async fn list_interfaces(&self) -> Result<Vec<InterfaceState>>;
    async fn find_interface_by_name(&self, name: &str) -> Result<Option<InterfaceState>>;
    async fn list_connections(&self) -> Result<Vec<ConnectionProfile>>;
    /// Return the profile named after the interface, creating it if missing
    async fn get_or_create_wired_profile(&self, interface_name: &str) -> Result<ConnectionProfile>;
    /// Update and persist the profile, then (re)activate it on the interface
    async fn update_and_activate(
        &self,
        profile: &ConnectionProfile,
        interface_name: &str,
    ) -> Result<()>;
    async fn disconnect(&self, interface_name: &str) -> Result<()>;
    async fn request_scan(&self, interface_name: &str) -> Result<()>;
    async fn list_access_points(&self, interface_name: &str) -> Result<Vec<AccessPoint>>;
    /// Persist a wireless profile; the returned profile carries its uuid
    async fn create_or_update_wifi_profile(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionProfile>;
    async fn activate(&self, profile: &ConnectionProfile, interface_name: &str) -> Result<()>;
    async fn dhcp_lease_info(&self, interface_name: &str) -> Result<Option<Ipv4Address>>;
}

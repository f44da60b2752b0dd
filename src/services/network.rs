use crate::network_client::{
    ConnectionProfile, DEFAULT_IP, DEFAULT_PREFIX, InterfaceKind, InterfaceState, Ipv4Address,
    Ipv4Method, Ipv4Settings, NetworkClient,
};
use anyhow::{Context, Result, bail, ensure};
use log::info;
use serde_valid::Validate;
use std::{fmt, net::Ipv4Addr};

// ============================================================================
// Structs
// ============================================================================

/// One change requested through an interface submenu
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkEdit {
    Dhcp(bool),
    Ip(Ipv4Addr),
    Prefix(u8),
    Disconnect,
}

impl NetworkEdit {
    /// Parse the new value of a DHCP checkbox
    ///
    /// Only `off` switches to manual addressing; every other value means on.
    pub fn dhcp(value: &str) -> Self {
        NetworkEdit::Dhcp(value.trim() != "off")
    }

    /// Parse the new value of an IP field
    ///
    /// LCDd pads octets with leading zeros (`192.168.001.010`).
    pub fn ip(value: &str) -> Result<Self> {
        let octets = value
            .trim()
            .split('.')
            .map(|octet| {
                octet
                    .trim()
                    .parse::<u8>()
                    .context(format!("failed to parse ip {value:?}: invalid octet {octet:?}"))
            })
            .collect::<Result<Vec<u8>>>()?;

        let [a, b, c, d] = octets.as_slice() else {
            bail!("failed to parse ip {value:?}: expected four octets");
        };

        Ok(NetworkEdit::Ip(Ipv4Addr::new(*a, *b, *c, *d)))
    }

    /// Parse the new value of a prefix length field (`24` or `/24`)
    pub fn prefix(value: &str) -> Result<Self> {
        let prefix = value
            .trim()
            .trim_start_matches('/')
            .parse::<u8>()
            .context(format!("failed to parse prefix {value:?}"))?;

        ensure!(prefix <= 32, "failed to parse prefix {value:?}: out of range");

        Ok(NetworkEdit::Prefix(prefix))
    }
}

impl fmt::Display for NetworkEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkEdit::Dhcp(true) => f.write_str("dhcp on"),
            NetworkEdit::Dhcp(false) => f.write_str("dhcp off"),
            NetworkEdit::Ip(ip) => write!(f, "ip {ip}"),
            NetworkEdit::Prefix(prefix) => write!(f, "prefix {prefix}"),
            NetworkEdit::Disconnect => f.write_str("disconnect"),
        }
    }
}

/// Apply an addressing edit to IPv4 settings
///
/// The address list is handled as a single address that gets replaced.
/// `Disconnect` leaves the settings untouched.
pub fn apply_edit(ipv4: &mut Ipv4Settings, edit: &NetworkEdit) {
    match edit {
        NetworkEdit::Dhcp(true) => {
            ipv4.method = Ipv4Method::Auto;
            ipv4.addresses.clear();
        }
        NetworkEdit::Dhcp(false) => {
            ipv4.method = Ipv4Method::Manual;
            if ipv4.addresses.is_empty() {
                ipv4.addresses.push(Ipv4Address::default());
            }
        }
        NetworkEdit::Ip(ip) => {
            let prefix = ipv4
                .first_address()
                .map_or(DEFAULT_PREFIX, |address| address.prefix);
            ipv4.method = Ipv4Method::Manual;
            ipv4.addresses = vec![Ipv4Address { ip: *ip, prefix }];
        }
        NetworkEdit::Prefix(prefix) => {
            let ip = ipv4.first_address().map_or(DEFAULT_IP, |address| address.ip);
            ipv4.method = Ipv4Method::Manual;
            ipv4.addresses = vec![Ipv4Address {
                ip,
                prefix: *prefix,
            }];
        }
        NetworkEdit::Disconnect => {}
    }
}

// ============================================================================
// Service
// ============================================================================

/// Service for applying interface submenu edits
pub struct NetworkConfigService;

impl NetworkConfigService {
    /// Apply an edit to the profile of an interface and push it
    ///
    /// # Arguments
    /// * `client` - Network client used to read and write profiles
    /// * `interface` - Interface the edit was made on
    /// * `edit` - Requested change
    ///
    /// # Returns
    /// Result indicating success or failure
    pub async fn set_network_config<T>(
        client: &T,
        interface: &InterfaceState,
        edit: &NetworkEdit,
    ) -> Result<()>
    where
        T: NetworkClient,
    {
        info!("set network config of {}: {edit}", interface.name);

        if *edit == NetworkEdit::Disconnect {
            ensure!(
                interface.kind == InterfaceKind::Wifi,
                "failed to disconnect {}: not a wifi interface",
                interface.name
            );
            return client.disconnect(&interface.name).await;
        }

        let mut profile = Self::profile_for(client, interface)
            .await?
            .context(format!("failed to edit {}: no active profile", interface.name))?;

        apply_edit(&mut profile.ipv4, edit);

        for address in &profile.ipv4.addresses {
            address
                .validate()
                .context(format!("network validation failed for {address}"))?;
        }

        client
            .update_and_activate(&profile, &interface.name)
            .await
    }

    /// Profile whose settings the interface submenu shows and edits
    ///
    /// # Returns
    /// The wired profile named after an Ethernet interface (created on demand)
    /// or the active profile of a Wi-Fi interface. `None` for a Wi-Fi
    /// interface without active connection.
    pub async fn profile_for<T>(
        client: &T,
        interface: &InterfaceState,
    ) -> Result<Option<ConnectionProfile>>
    where
        T: NetworkClient,
    {
        match interface.kind {
            InterfaceKind::Ethernet => client
                .get_or_create_wired_profile(&interface.name)
                .await
                .map(Some),
            InterfaceKind::Wifi => {
                let Some(active) = &interface.active_connection else {
                    return Ok(None);
                };

                Ok(client
                    .list_connections()
                    .await?
                    .into_iter()
                    .find(|profile| profile.name == *active))
            }
            InterfaceKind::Other => bail!(
                "failed to get profile of {}: unsupported interface kind",
                interface.name
            ),
        }
    }
}

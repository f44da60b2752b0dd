use crate::{
    menu_id::ScanField,
    network_client::{
        AccessPoint, ConnectionProfile, DEFAULT_IP, DEFAULT_PREFIX, Ipv4Method, Ipv4Settings,
        NetworkClient,
    },
    services::network::NetworkEdit,
};
use anyhow::{Context, Result};
use log::{info, warn};
use std::{collections::HashMap, fmt, net::Ipv4Addr};

/// Options collected by the scan list entries before connecting
///
/// Reset whenever a new scan starts.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingWifiConnect {
    ssid_by_handle: HashMap<String, String>,
    pub passphrase: String,
    pub dhcp: bool,
    pub ip: Ipv4Addr,
    pub prefix: u8,
}

impl Default for PendingWifiConnect {
    fn default() -> Self {
        Self {
            ssid_by_handle: HashMap::new(),
            passphrase: String::new(),
            dhcp: true,
            ip: DEFAULT_IP,
            prefix: DEFAULT_PREFIX,
        }
    }
}

impl fmt::Debug for PendingWifiConnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingWifiConnect")
            .field("ssid_by_handle", &self.ssid_by_handle)
            .field("passphrase", &"<redacted>")
            .field("dhcp", &self.dhcp)
            .field("ip", &self.ip)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PendingWifiConnect {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget the field edits but keep the handle lookup table
    pub fn clear_edits(&mut self) {
        let ssid_by_handle = std::mem::take(&mut self.ssid_by_handle);
        *self = Self {
            ssid_by_handle,
            ..Self::default()
        };
    }

    pub fn remember(&mut self, access_point: &AccessPoint) {
        self.ssid_by_handle
            .insert(access_point.handle.clone(), access_point.ssid.clone());
    }

    pub fn ssid(&self, handle: &str) -> Option<&str> {
        self.ssid_by_handle.get(handle).map(String::as_str)
    }

    /// Store the new value of a scan entry field
    ///
    /// Unparseable values are dropped with a warning. `Connect` is not a field.
    pub fn capture(&mut self, field: ScanField, value: &str) {
        match field {
            ScanField::Passphrase => self.passphrase = value.to_string(),
            ScanField::Dhcp => {
                if let NetworkEdit::Dhcp(dhcp) = NetworkEdit::dhcp(value) {
                    self.dhcp = dhcp;
                }
            }
            ScanField::Ip => match NetworkEdit::ip(value) {
                Ok(NetworkEdit::Ip(ip)) => self.ip = ip,
                Ok(_) => {}
                Err(e) => warn!("dropping wifi ip: {e:#}"),
            },
            ScanField::Prefix => match NetworkEdit::prefix(value) {
                Ok(NetworkEdit::Prefix(prefix)) => self.prefix = prefix,
                Ok(_) => {}
                Err(e) => warn!("dropping wifi prefix: {e:#}"),
            },
            ScanField::Connect => warn!("connect is not a capturable field"),
        }
    }
}

/// Keep the first access point of every SSID
pub fn dedup_by_ssid(access_points: Vec<AccessPoint>) -> Vec<AccessPoint> {
    let mut unique: Vec<AccessPoint> = Vec::with_capacity(access_points.len());

    for access_point in access_points {
        if access_point.ssid.is_empty() {
            continue;
        }
        if unique.iter().any(|seen| seen.ssid == access_point.ssid) {
            continue;
        }
        unique.push(access_point);
    }

    unique
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// new profile was persisted and activated
    Created,
    /// existing profile was updated; NetworkManager picks it up on its own
    Updated,
}

/// Service committing the scan list connect wizard
pub struct WifiConnectService;

impl WifiConnectService {
    /// Save a wireless profile for `ssid` on `interface_name`
    ///
    /// # Arguments
    /// * `client` - Network client
    /// * `interface_name` - Wi-Fi interface the scan ran on
    /// * `ssid` - Selected network
    /// * `pending` - Collected options; only the passphrase is applied,
    ///   addressing is always automatic
    ///
    /// # Returns
    /// Whether a new profile was created or an existing one updated
    pub async fn connect<T>(
        client: &T,
        interface_name: &str,
        ssid: &str,
        pending: &PendingWifiConnect,
    ) -> Result<ConnectOutcome>
    where
        T: NetworkClient,
    {
        info!("connect {interface_name} to {ssid:?}");

        let existing = client
            .list_connections()
            .await
            .context("failed to look up existing wifi profile")?
            .into_iter()
            .find(|profile| profile.name == ssid);

        let is_new = existing.is_none();
        let mut profile =
            existing.unwrap_or_else(|| ConnectionProfile::wireless(ssid, interface_name));

        profile.ssid = Some(ssid.to_string());
        profile.interface_name = Some(interface_name.to_string());
        profile.autoconnect = true;
        profile.psk = (!pending.passphrase.is_empty()).then(|| pending.passphrase.clone());
        profile.ipv4 = Ipv4Settings {
            method: Ipv4Method::Auto,
            addresses: Vec::new(),
        };

        if !pending.dhcp {
            warn!(
                "static addressing for {ssid:?} is not applied, using dhcp ({}/{})",
                pending.ip, pending.prefix
            );
        }

        let profile = client
            .create_or_update_wifi_profile(&profile)
            .await
            .context(format!("failed to save wifi profile {ssid:?}"))?;

        if !is_new {
            return Ok(ConnectOutcome::Updated);
        }

        client
            .activate(&profile, interface_name)
            .await
            .context(format!("failed to activate wifi profile {ssid:?}"))?;

        Ok(ConnectOutcome::Created)
    }
}

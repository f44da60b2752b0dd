//! NetworkManager backend driving the `nmcli` command line client
//!
//! All queries use terse mode (`-t`): fields are separated by `:` and
//! literal colons and backslashes inside values are escaped with `\`.

use crate::network_client::{
    AccessPoint, ConnectionKind, ConnectionProfile, DeviceState, InterfaceKind, InterfaceState,
    Ipv4Address, Ipv4Method, Ipv4Settings, NetworkClient,
};
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::process::Command;

const SECRET_SETTINGS: &[&str] = &["wifi-sec.psk", "802-11-wireless-security.psk"];

#[derive(Clone, Debug)]
pub struct NmcliClient {
    binary: PathBuf,
}

impl NmcliClient {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    /// Version reported by `nmcli --version`
    pub async fn version(&self) -> Result<String> {
        let stdout = self.run(&["--version"]).await?;
        stdout
            .split_whitespace()
            .last()
            .map(str::to_string)
            .context("failed to parse nmcli version")
    }

    /// Run nmcli and return its stdout
    ///
    /// A non-zero exit status is an error carrying stderr.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let printable = redact(args);
        debug!("run {} {printable}", self.binary.display());

        let output = Command::new(&self.binary)
            .args(args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output()
            .await
            .context(format!("failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "nmcli {printable} failed with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn connection_details(&self, uuid: &str) -> Result<ConnectionProfile> {
        let stdout = self
            .run(&["-t", "connection", "show", "uuid", uuid])
            .await
            .context(format!("failed to show connection {uuid}"))?;

        parse_connection_details(&stdout)
    }

    async fn find_connection_by_name(&self, name: &str) -> Result<Option<ConnectionProfile>> {
        Ok(self
            .list_connections()
            .await?
            .into_iter()
            .find(|profile| profile.name == name))
    }

    async fn active_ssid(&self, interface_name: &str) -> Option<String> {
        match self.list_access_points(interface_name).await {
            Ok(access_points) => access_points
                .into_iter()
                .find(|ap| ap.active)
                .map(|ap| ap.ssid),
            Err(e) => {
                warn!("failed to get active access point of {interface_name}: {e:#}");
                None
            }
        }
    }
}

impl NetworkClient for NmcliClient {
    async fn list_interfaces(&self) -> Result<Vec<InterfaceState>> {
        let stdout = self
            .run(&["-t", "-f", "DEVICE,TYPE,STATE,CONNECTION", "device", "status"])
            .await
            .context("failed to list devices")?;

        let mut interfaces = parse_device_status(&stdout);

        for interface in &mut interfaces {
            if interface.kind == InterfaceKind::Wifi && interface.active_connection.is_some() {
                interface.active_ssid = self.active_ssid(&interface.name).await;
            }
        }

        Ok(interfaces)
    }

    async fn find_interface_by_name(&self, name: &str) -> Result<Option<InterfaceState>> {
        Ok(self
            .list_interfaces()
            .await?
            .into_iter()
            .find(|interface| interface.name == name))
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionProfile>> {
        let stdout = self
            .run(&["-t", "-f", "NAME,UUID,TYPE,DEVICE", "connection", "show"])
            .await
            .context("failed to list connections")?;

        let mut profiles = Vec::new();
        for uuid in parse_connection_list(&stdout) {
            profiles.push(self.connection_details(&uuid).await?);
        }

        Ok(profiles)
    }

    async fn get_or_create_wired_profile(&self, interface_name: &str) -> Result<ConnectionProfile> {
        if let Some(profile) = self.find_connection_by_name(interface_name).await? {
            return Ok(profile);
        }

        self.run(&[
            "connection",
            "add",
            "type",
            "ethernet",
            "ifname",
            interface_name,
            "con-name",
            interface_name,
            "ipv4.method",
            "auto",
        ])
        .await
        .context(format!("failed to create wired profile for {interface_name}"))?;

        self.find_connection_by_name(interface_name)
            .await?
            .context(format!("failed to find created profile {interface_name}"))
    }

    async fn update_and_activate(
        &self,
        profile: &ConnectionProfile,
        interface_name: &str,
    ) -> Result<()> {
        let uuid = profile
            .uuid
            .as_deref()
            .context(format!("failed to update {}: profile not persisted", profile.name))?;

        let addresses = join_addresses(&profile.ipv4.addresses);
        let mut args = vec!["connection", "modify", "uuid", uuid];
        args.extend(["connection.autoconnect", yes_no(profile.autoconnect)]);
        args.extend(["ipv4.addresses", addresses.as_str()]);
        args.extend(["ipv4.method", profile.ipv4.method.as_str()]);

        self.run(&args)
            .await
            .context(format!("failed to update profile {}", profile.name))?;

        self.run(&["connection", "up", "uuid", uuid, "ifname", interface_name])
            .await
            .context(format!(
                "failed to activate profile {} on {interface_name}",
                profile.name
            ))?;

        Ok(())
    }

    async fn disconnect(&self, interface_name: &str) -> Result<()> {
        self.run(&["device", "disconnect", interface_name])
            .await
            .context(format!("failed to disconnect {interface_name}"))?;
        Ok(())
    }

    async fn request_scan(&self, interface_name: &str) -> Result<()> {
        self.run(&["device", "wifi", "rescan", "ifname", interface_name])
            .await
            .context(format!("failed to request scan on {interface_name}"))?;
        Ok(())
    }

    async fn list_access_points(&self, interface_name: &str) -> Result<Vec<AccessPoint>> {
        let stdout = self
            .run(&[
                "-t",
                "-f",
                "ACTIVE,BSSID,SSID",
                "device",
                "wifi",
                "list",
                "ifname",
                interface_name,
                "--rescan",
                "no",
            ])
            .await
            .context(format!("failed to list access points on {interface_name}"))?;

        Ok(parse_access_points(&stdout))
    }

    async fn create_or_update_wifi_profile(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionProfile> {
        let ssid = profile
            .ssid
            .as_deref()
            .context(format!("failed to save {}: ssid missing", profile.name))?;
        let interface_name = profile.interface_name.as_deref().unwrap_or("*");
        let addresses = join_addresses(&profile.ipv4.addresses);

        let mut args = Vec::new();
        match &profile.uuid {
            Some(uuid) => {
                args.extend(["connection", "modify", "uuid", uuid.as_str()]);
                args.extend(["802-11-wireless.ssid", ssid]);
                args.extend(["connection.interface-name", interface_name]);
            }
            None => {
                args.extend(["connection", "add", "type", "wifi"]);
                args.extend(["ifname", interface_name, "con-name", profile.name.as_str()]);
                args.extend(["ssid", ssid]);
            }
        }
        args.extend(["connection.autoconnect", yes_no(profile.autoconnect)]);
        args.extend(["ipv4.addresses", addresses.as_str()]);
        args.extend(["ipv4.method", profile.ipv4.method.as_str()]);
        if let Some(psk) = &profile.psk {
            args.extend(["wifi-sec.key-mgmt", "wpa-psk", "wifi-sec.psk", psk.as_str()]);
        }

        let stdout = self
            .run(&args)
            .await
            .context(format!("failed to save wifi profile {}", profile.name))?;

        let uuid = match &profile.uuid {
            Some(uuid) => uuid.clone(),
            None => parse_added_uuid(&stdout)
                .context(format!("failed to get uuid of new profile {}", profile.name))?,
        };

        Ok(ConnectionProfile {
            uuid: Some(uuid),
            ..profile.clone()
        })
    }

    async fn activate(&self, profile: &ConnectionProfile, interface_name: &str) -> Result<()> {
        let uuid = profile
            .uuid
            .as_deref()
            .context(format!("failed to activate {}: profile not persisted", profile.name))?;

        self.run(&["connection", "up", "uuid", uuid, "ifname", interface_name])
            .await
            .context(format!(
                "failed to activate profile {} on {interface_name}",
                profile.name
            ))?;
        Ok(())
    }

    async fn dhcp_lease_info(&self, interface_name: &str) -> Result<Option<Ipv4Address>> {
        let stdout = self
            .run(&["-t", "-f", "IP4.ADDRESS", "device", "show", interface_name])
            .await
            .context(format!("failed to get address of {interface_name}"))?;

        Ok(parse_ip4_address(&stdout))
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn join_addresses(addresses: &[Ipv4Address]) -> String {
    addresses
        .iter()
        .map(Ipv4Address::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn redact(args: &[&str]) -> String {
    let mut printable = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        if hide_next {
            printable.push("<redacted>");
        } else {
            printable.push(arg);
        }
        hide_next = SECRET_SETTINGS.contains(arg);
    }

    printable.join(" ")
}

/// Split one terse mode line into its unescaped fields
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);

    fields
}

fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                unescaped.push(escaped);
            }
        } else {
            unescaped.push(c);
        }
    }

    unescaped
}

fn non_empty(value: &str) -> Option<String> {
    match value.trim() {
        "" | "--" => None,
        value => Some(value.to_string()),
    }
}

fn parse_interface_kind(value: &str) -> InterfaceKind {
    match value {
        "ethernet" => InterfaceKind::Ethernet,
        "wifi" => InterfaceKind::Wifi,
        _ => InterfaceKind::Other,
    }
}

fn parse_device_state(value: &str) -> DeviceState {
    // e.g. "connected (externally)", "connecting (getting IP configuration)"
    match value.split_whitespace().next().unwrap_or_default() {
        "unmanaged" => DeviceState::Unmanaged,
        "unavailable" => DeviceState::Unavailable,
        "disconnected" => DeviceState::Disconnected,
        "connecting" => DeviceState::Connecting,
        "connected" => DeviceState::Connected,
        "deactivating" => DeviceState::Deactivating,
        "failed" => DeviceState::Failed,
        _ => DeviceState::Unknown,
    }
}

/// Parse `-t -f DEVICE,TYPE,STATE,CONNECTION device status`
pub fn parse_device_status(stdout: &str) -> Vec<InterfaceState> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            let [name, kind, state, connection] = fields.as_slice() else {
                warn!("unexpected device status line: {line:?}");
                return None;
            };

            Some(InterfaceState {
                name: name.clone(),
                kind: parse_interface_kind(kind),
                state: parse_device_state(state),
                active_connection: non_empty(connection),
                active_ssid: None,
            })
        })
        .collect()
}

/// Parse `-t -f NAME,UUID,TYPE,DEVICE connection show` into uuids
pub fn parse_connection_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            fields.get(1).and_then(|uuid| non_empty(uuid))
        })
        .collect()
}

fn parse_connection_kind(value: &str) -> ConnectionKind {
    match value {
        "802-3-ethernet" | "ethernet" => ConnectionKind::Wired,
        "802-11-wireless" | "wifi" => ConnectionKind::Wireless,
        other => ConnectionKind::Other(other.to_string()),
    }
}

/// Parse the `setting.property:value` lines of `-t connection show uuid <uuid>`
pub fn parse_connection_details(stdout: &str) -> Result<ConnectionProfile> {
    let mut name = None;
    let mut uuid = None;
    let mut kind = None;
    let mut interface_name = None;
    let mut autoconnect = true;
    let mut ssid = None;
    let mut method = Ipv4Method::default();
    let mut addresses = Vec::new();

    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = unescape(value);

        match key {
            "connection.id" => name = non_empty(&value),
            "connection.uuid" => uuid = non_empty(&value),
            "connection.type" => kind = Some(parse_connection_kind(&value)),
            "connection.interface-name" => interface_name = non_empty(&value),
            "connection.autoconnect" => autoconnect = value == "yes",
            "802-11-wireless.ssid" => ssid = non_empty(&value),
            "ipv4.method" => method = Ipv4Method::parse(&value),
            "ipv4.addresses" => {
                addresses = value
                    .split(',')
                    .filter_map(non_empty)
                    .filter_map(|address| match address.parse() {
                        Ok(address) => Some(address),
                        Err(e) => {
                            warn!("ignoring address {address:?}: {e:#}");
                            None
                        }
                    })
                    .collect();
            }
            _ => {}
        }
    }

    Ok(ConnectionProfile {
        name: name.context("failed to parse connection: connection.id missing")?,
        uuid,
        kind: kind.context("failed to parse connection: connection.type missing")?,
        interface_name,
        autoconnect,
        ssid,
        ipv4: Ipv4Settings { method, addresses },
        psk: None,
    })
}

/// Parse `-t -f ACTIVE,BSSID,SSID device wifi list`
///
/// The handle is the BSSID without separators. Hidden networks are skipped.
pub fn parse_access_points(stdout: &str) -> Vec<AccessPoint> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            let [active, bssid, ssid] = fields.as_slice() else {
                return None;
            };

            let ssid = non_empty(ssid)?;
            let handle: String = bssid
                .chars()
                .filter(char::is_ascii_hexdigit)
                .map(|c| c.to_ascii_lowercase())
                .collect();
            if handle.is_empty() {
                return None;
            }

            Some(AccessPoint {
                handle,
                ssid,
                active: active == "yes",
            })
        })
        .collect()
}

/// First address of `-t -f IP4.ADDRESS device show`
pub fn parse_ip4_address(stdout: &str) -> Option<Ipv4Address> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.starts_with("IP4.ADDRESS"))
        .find_map(|(_, value)| value.trim().parse().ok())
}

/// Uuid from `Connection 'name' (<uuid>) successfully added.`
fn parse_added_uuid(stdout: &str) -> Option<String> {
    let start = stdout.rfind('(')? + 1;
    let end = start + stdout[start..].find(')')?;
    non_empty(&stdout[start..end])
}

#![allow(dead_code)]

use anyhow::{Result, bail};
use lcd_network_menu::{
    network_client::{
        AccessPoint, ConnectionProfile, DeviceState, InterfaceState, Ipv4Address, NetworkClient,
    },
    protocol::Command,
};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

pub const FIXTURE: &str = r#"{
    "interfaces": [
        { "name": "eth0", "kind": "ethernet", "state": "connected", "active_connection": "eth0" },
        { "name": "wlan0", "kind": "wifi", "state": "connected", "active_connection": "Home", "active_ssid": "Home" },
        { "name": "lo", "kind": "other", "state": "connected", "active_connection": "lo" },
        { "name": "eth1", "kind": "ethernet", "state": "unmanaged" }
    ],
    "connections": [
        {
            "name": "Home",
            "uuid": "uuid-Home",
            "kind": "wireless",
            "interface_name": "wlan0",
            "autoconnect": true,
            "ssid": "Home",
            "ipv4": { "method": "auto", "addresses": [] }
        }
    ],
    "access_points": {
        "wlan0": [
            { "handle": "aa01", "ssid": "Home", "active": true },
            { "handle": "aa02", "ssid": "Office", "active": false },
            { "handle": "aa03", "ssid": "Home", "active": false }
        ]
    },
    "leases": {
        "wlan0": { "ip": "192.168.1.50", "prefix": 24 }
    }
}"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FakeState {
    pub interfaces: Vec<InterfaceState>,
    pub connections: Vec<ConnectionProfile>,
    pub access_points: HashMap<String, Vec<AccessPoint>>,
    pub leases: HashMap<String, Ipv4Address>,
    pub fail_scans: bool,
    #[serde(skip)]
    pub calls: Vec<String>,
}

/// In-memory NetworkManager; clones share their state
#[derive(Clone, Debug, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<FakeState>>,
}

impl FakeNetwork {
    pub fn fixture() -> Self {
        Self::from_json(FIXTURE)
    }

    pub fn from_json(json: &str) -> Self {
        let state: FakeState = serde_json::from_str(json).expect("invalid fake network fixture");
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake network state poisoned")
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn connection(&self, name: &str) -> Option<ConnectionProfile> {
        self.state()
            .connections
            .iter()
            .find(|profile| profile.name == name)
            .cloned()
    }

    pub fn remove_interface(&self, name: &str) {
        self.state().interfaces.retain(|interface| interface.name != name);
    }

    fn record(&self, call: String) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

impl NetworkClient for FakeNetwork {
    async fn list_interfaces(&self) -> Result<Vec<InterfaceState>> {
        Ok(self.record("list_interfaces".to_string()).interfaces.clone())
    }

    async fn find_interface_by_name(&self, name: &str) -> Result<Option<InterfaceState>> {
        Ok(self
            .state()
            .interfaces
            .iter()
            .find(|interface| interface.name == name)
            .cloned())
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionProfile>> {
        Ok(self.state().connections.clone())
    }

    async fn get_or_create_wired_profile(&self, interface_name: &str) -> Result<ConnectionProfile> {
        let mut state = self.record(format!("get_or_create_wired_profile {interface_name}"));

        if let Some(profile) = state
            .connections
            .iter()
            .find(|profile| profile.name == interface_name)
        {
            return Ok(profile.clone());
        }

        let mut profile = ConnectionProfile::wired(interface_name);
        profile.uuid = Some(format!("uuid-{interface_name}"));
        state.connections.push(profile.clone());

        Ok(profile)
    }

    async fn update_and_activate(
        &self,
        profile: &ConnectionProfile,
        interface_name: &str,
    ) -> Result<()> {
        let mut state = self.record(format!("update_and_activate {} {interface_name}", profile.name));

        let Some(stored) = state
            .connections
            .iter_mut()
            .find(|stored| stored.uuid == profile.uuid)
        else {
            bail!("unknown profile {}", profile.name);
        };
        *stored = profile.clone();

        Ok(())
    }

    async fn disconnect(&self, interface_name: &str) -> Result<()> {
        let mut state = self.record(format!("disconnect {interface_name}"));

        if let Some(interface) = state
            .interfaces
            .iter_mut()
            .find(|interface| interface.name == interface_name)
        {
            interface.state = DeviceState::Disconnected;
            interface.active_connection = None;
            interface.active_ssid = None;
        }

        Ok(())
    }

    async fn request_scan(&self, interface_name: &str) -> Result<()> {
        let state = self.record(format!("request_scan {interface_name}"));
        if state.fail_scans {
            bail!("scan not allowed");
        }
        Ok(())
    }

    async fn list_access_points(&self, interface_name: &str) -> Result<Vec<AccessPoint>> {
        let state = self.record(format!("list_access_points {interface_name}"));
        Ok(state
            .access_points
            .get(interface_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_or_update_wifi_profile(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionProfile> {
        let mut state = self.record(format!("save_wifi {}", profile.name));

        let mut saved = profile.clone();
        match state
            .connections
            .iter_mut()
            .find(|stored| stored.uuid.is_some() && stored.uuid == profile.uuid)
        {
            Some(stored) => *stored = saved.clone(),
            None => {
                saved.uuid = Some(format!("uuid-{}", profile.name));
                state.connections.push(saved.clone());
            }
        }

        Ok(saved)
    }

    async fn activate(&self, profile: &ConnectionProfile, interface_name: &str) -> Result<()> {
        let mut state = self.record(format!("activate {} {interface_name}", profile.name));

        if let Some(interface) = state
            .interfaces
            .iter_mut()
            .find(|interface| interface.name == interface_name)
        {
            interface.state = DeviceState::Connected;
            interface.active_connection = Some(profile.name.clone());
            interface.active_ssid = profile.ssid.clone();
        }

        Ok(())
    }

    async fn dhcp_lease_info(&self, interface_name: &str) -> Result<Option<Ipv4Address>> {
        Ok(self.state().leases.get(interface_name).copied())
    }
}

/// What LCDd would show after applying a command stream
///
/// Fails on anything LCDd would reject and on deletes that leave a
/// menu without children.
#[derive(Debug, Default)]
pub struct DaemonModel {
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl DaemonModel {
    pub fn apply_all(&mut self, commands: &[Command]) -> Result<()> {
        for command in commands {
            self.apply(command)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::MenuAddItem { parent, id, .. } => {
                if self.parents.contains_key(id) {
                    bail!("duplicate item {id}");
                }
                if !parent.is_empty() && !self.parents.contains_key(parent) {
                    bail!("unknown parent {parent} of {id}");
                }
                self.parents.insert(id.clone(), parent.clone());
                self.children.entry(parent.clone()).or_default().push(id.clone());
            }
            Command::MenuDelItem { id } => {
                let Some(parent) = self.parents.get(id).cloned() else {
                    bail!("deleting unknown item {id}");
                };
                self.forget(id);
                let siblings = self.children.entry(parent.clone()).or_default();
                siblings.retain(|child| child != id);
                if siblings.is_empty() {
                    bail!("deleting {id} left menu {parent:?} empty");
                }
            }
            Command::MenuSetItem { id, .. } => {
                if !self.parents.contains_key(id) {
                    bail!("setting unknown item {id}");
                }
            }
            Command::Hello | Command::ClientSet { .. } => {}
        }
        Ok(())
    }

    fn forget(&mut self, id: &str) {
        self.parents.remove(id);
        if let Some(children) = self.children.remove(id) {
            for child in children {
                self.forget(&child);
            }
        }
    }

    pub fn children(&self, id: &str) -> Vec<String> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }
}

pub fn lines(commands: &[Command]) -> Vec<String> {
    commands.iter().map(Command::to_string).collect()
}

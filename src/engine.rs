//! Menu event dispatcher
//!
//! Translates LCDd menu events into network changes and keeps the menu
//! tree in step with the interfaces NetworkManager reports. All menu
//! mutations go through the [`MenuRegistry`], whose queued commands the
//! session sends after every event.
//!
//! Menus are never left empty while shown: a placeholder child is added
//! before a menu is cleared and removed once real children exist again.
//! Interface submenus get their first children when entered.

use crate::{
    menu_id::{InterfaceOption, MenuId, ScanField},
    menu_registry::MenuRegistry,
    network_client::{
        ConnectionProfile, DEFAULT_IP, DEFAULT_PREFIX, InterfaceKind, InterfaceState,
        NetworkClient,
    },
    protocol::{Command, MenuEvent, MenuEventKind, MenuResult, WidgetSpec},
    services::{
        network::{NetworkConfigService, NetworkEdit},
        wifi::{PendingWifiConnect, WifiConnectService, dedup_by_ssid},
    },
};
use anyhow::{Context, Result, anyhow, bail};
use log::{debug, error, info, warn};

const PLEASE_WAIT: &str = "Please wait...";
const NO_INTERFACES: &str = "No interfaces";
const SCANNING: &str = "Scanning...";
const NO_NETWORKS: &str = "No networks found";
const NOT_AVAILABLE: &str = "Not available";

pub struct SyncEngine<T> {
    network: T,
    registry: MenuRegistry,
    pending_wifi: PendingWifiConnect,
    scheduled_scans: Vec<String>,
}

impl<T: NetworkClient> SyncEngine<T> {
    pub fn new(network: T) -> Self {
        Self {
            network,
            registry: MenuRegistry::new(),
            pending_wifi: PendingWifiConnect::default(),
            scheduled_scans: Vec::new(),
        }
    }

    pub fn network(&self) -> &T {
        &self.network
    }

    pub fn registry(&self) -> &MenuRegistry {
        &self.registry
    }

    pub fn pending_wifi(&self) -> &PendingWifiConnect {
        &self.pending_wifi
    }

    /// Commands produced since the last call, in order
    pub fn take_commands(&mut self) -> Vec<Command> {
        self.registry.take_commands()
    }

    /// Interfaces whose scan results should be collected after the settle delay
    pub fn take_scheduled_scans(&mut self) -> Vec<String> {
        std::mem::take(&mut self.scheduled_scans)
    }

    /// Forget everything the daemon was told, e.g. after the connection was lost
    pub fn reset(&mut self) {
        self.registry.clear();
        self.pending_wifi.reset();
        self.scheduled_scans.clear();
    }

    /// Handle one menu event; failures are logged and do not stop the session
    pub async fn handle_menu_event(&mut self, event: &MenuEvent) {
        if let Err(e) = self.dispatch(event).await {
            error!("failed to handle menuevent {} {}: {e:#}", event.kind, event.id);
        }
    }

    async fn dispatch(&mut self, event: &MenuEvent) -> Result<()> {
        use MenuEventKind::{Enter, Select, Update};

        match (event.kind, &event.id) {
            (_, MenuId::Placeholder(_)) => {
                debug!("ignoring {} on placeholder {}", event.kind, event.id);
                Ok(())
            }
            (Enter, MenuId::Root) => self.refresh_main_menu().await,
            (Enter, MenuId::ScanList(interface)) => self.start_scan(interface).await,
            (Enter, MenuId::Interface(interface)) => self.rebuild_interface_menu(interface).await,
            (
                Update | Select,
                MenuId::ScanField {
                    interface,
                    handle,
                    field: ScanField::Connect,
                },
            ) => self.commit_wifi_connect(interface, handle).await,
            (
                Update | Select,
                MenuId::ScanField {
                    interface,
                    handle,
                    field,
                },
            ) => {
                self.capture_scan_field(interface, handle, *field, event.value.as_deref());
                Ok(())
            }
            (Update | Select, MenuId::Option { interface, option }) => {
                self.edit_interface(interface, *option, event.value.as_deref())
                    .await
            }
            _ => {
                debug!("ignoring menuevent {} {}", event.kind, event.id);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // main menu
    // ------------------------------------------------------------------------

    /// Differential rebuild of the main menu
    ///
    /// Existing interface entries are relabeled in place, new ones added and
    /// vanished ones deleted.
    pub async fn refresh_main_menu(&mut self) -> Result<()> {
        let interfaces = self
            .network
            .list_interfaces()
            .await
            .context("failed to list interfaces")?;

        let shown = shown_interfaces(interfaces);
        let shown_ids = shown
            .iter()
            .map(|interface| MenuId::interface(&interface.name))
            .collect::<Result<Vec<_>>>()?;

        let root = MenuId::Root;
        let placeholder = MenuId::placeholder(MenuId::Root);
        let tracked = self.registry.real_children(&root);

        if (tracked.is_empty() || shown.is_empty()) && !self.registry.contains(&root, &placeholder)
        {
            self.registry
                .add_item(&root, &placeholder, WidgetSpec::action(PLEASE_WAIT))?;
        }

        for (interface, id) in shown.iter().zip(&shown_ids) {
            if tracked.contains(id) {
                self.registry.set_text(id, interface.label());
            } else {
                info!("show interface {}", interface.name);
                self.registry
                    .add_item(&root, id, WidgetSpec::menu(interface.label()))?;
            }
        }

        for stale in tracked.iter().filter(|id| !shown_ids.contains(id)) {
            info!("hide interface {stale}");
            self.registry.del_item(&root, stale);
        }

        if shown.is_empty() {
            self.registry.set_text(&placeholder, NO_INTERFACES);
        } else if self.registry.contains(&root, &placeholder) {
            self.registry.del_item(&root, &placeholder);
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // interface submenus
    // ------------------------------------------------------------------------

    /// Destructive rebuild of an interface submenu
    pub async fn rebuild_interface_menu(&mut self, name: &str) -> Result<()> {
        let id = MenuId::interface(name)?;
        if !self.registry.contains(&MenuId::Root, &id) {
            debug!("not rebuilding {name}: not shown");
            return Ok(());
        }

        let placeholder = MenuId::placeholder(id.clone());
        if !self.registry.contains(&id, &placeholder) {
            self.registry
                .add_item(&id, &placeholder, WidgetSpec::action(PLEASE_WAIT))?;
        }
        self.registry.empty_menu(&id);

        if let Err(e) = self.build_interface_menu(&id, name).await {
            error!("failed to build menu of {name}: {e:#}");
        }

        if self.registry.real_children(&id).is_empty() {
            self.registry.set_text(&placeholder, NOT_AVAILABLE);
        } else {
            self.registry.del_item(&id, &placeholder);
        }

        Ok(())
    }

    async fn build_interface_menu(&mut self, id: &MenuId, name: &str) -> Result<()> {
        let interface = self
            .network
            .find_interface_by_name(name)
            .await?
            .context(format!("failed to find interface {name}"))?;

        match interface.kind {
            InterfaceKind::Ethernet => {
                let profile = NetworkConfigService::profile_for(&self.network, &interface).await?;
                if let Some(profile) = profile {
                    self.add_addressing_items(id, name, &profile).await?;
                }
            }
            InterfaceKind::Wifi => {
                if let Some(active) = &interface.active_connection {
                    let ssid = interface.active_ssid.as_deref().unwrap_or(active);
                    self.registry.add_item(
                        id,
                        &MenuId::option(name, InterfaceOption::Ssid),
                        WidgetSpec::action(format!("SSID: {ssid}")),
                    )?;
                    self.registry.add_item(
                        id,
                        &MenuId::option(name, InterfaceOption::Disconnect),
                        WidgetSpec::action("Disconnect"),
                    )?;

                    match NetworkConfigService::profile_for(&self.network, &interface).await {
                        Ok(Some(profile)) => self.add_addressing_items(id, name, &profile).await?,
                        Ok(None) => warn!("active profile {active} of {name} not found"),
                        Err(e) => error!("failed to get profile of {name}: {e:#}"),
                    }
                }
                self.add_wifi_items(id, name)?;
            }
            InterfaceKind::Other => bail!("failed to build menu of {name}: unsupported kind"),
        }

        Ok(())
    }

    async fn add_addressing_items(
        &mut self,
        id: &MenuId,
        name: &str,
        profile: &ConnectionProfile,
    ) -> Result<()> {
        let dhcp = profile.ipv4.is_dhcp();

        self.registry.add_item(
            id,
            &MenuId::option(name, InterfaceOption::Dhcp),
            WidgetSpec::checkbox("DHCP", dhcp),
        )?;

        if dhcp {
            match self.network.dhcp_lease_info(name).await {
                Ok(Some(address)) => self.registry.add_item(
                    id,
                    &MenuId::option(name, InterfaceOption::Lease),
                    WidgetSpec::action(address.to_string()),
                )?,
                Ok(None) => debug!("no lease on {name}"),
                Err(e) => warn!("failed to get lease of {name}: {e:#}"),
            }
        } else {
            let address = profile.ipv4.first_address().unwrap_or_default();
            self.registry.add_item(
                id,
                &MenuId::option(name, InterfaceOption::Ip),
                WidgetSpec::ip("IP", address.ip),
            )?;
            self.registry.add_item(
                id,
                &MenuId::option(name, InterfaceOption::Prefix),
                WidgetSpec::numeric("Prefix", address.prefix.into(), 0, 32),
            )?;
        }

        Ok(())
    }

    fn add_wifi_items(&mut self, id: &MenuId, name: &str) -> Result<()> {
        let list = MenuId::scan_list(name);
        self.registry
            .add_item(id, &list, WidgetSpec::menu("Scan and connect"))?;
        self.registry.add_item(
            &list,
            &MenuId::placeholder(list.clone()),
            WidgetSpec::action(SCANNING),
        )?;

        // TODO: replace with hotspot setup once NetworkManager AP mode is wired up
        let access_point = MenuId::option(name, InterfaceOption::AccessPoint);
        self.registry
            .add_item(id, &access_point, WidgetSpec::menu("Access point"))?;
        self.registry.add_item(
            &access_point,
            &MenuId::placeholder(access_point.clone()),
            WidgetSpec::action(NOT_AVAILABLE),
        )?;

        Ok(())
    }

    async fn edit_interface(
        &mut self,
        name: &str,
        option: InterfaceOption,
        value: Option<&str>,
    ) -> Result<()> {
        let edit = match (option, value) {
            (InterfaceOption::Dhcp, Some(value)) => Ok(NetworkEdit::dhcp(value)),
            (InterfaceOption::Ip, Some(value)) => NetworkEdit::ip(value),
            (InterfaceOption::Prefix, Some(value)) => NetworkEdit::prefix(value),
            (InterfaceOption::Disconnect, _) => Ok(NetworkEdit::Disconnect),
            (InterfaceOption::Dhcp | InterfaceOption::Ip | InterfaceOption::Prefix, None) => {
                Err(anyhow!("failed to edit {option} of {name}: value missing"))
            }
            (InterfaceOption::Ssid | InterfaceOption::Lease | InterfaceOption::AccessPoint, _) => {
                debug!("ignoring read-only item {name}_{option}");
                return Ok(());
            }
        };

        match edit {
            Ok(edit) => self.apply_edit(name, &edit).await,
            Err(e) => warn!("dropping edit: {e:#}"),
        }

        self.rebuild_interface_menu(name).await
    }

    async fn apply_edit(&mut self, name: &str, edit: &NetworkEdit) {
        let interface = match self.network.find_interface_by_name(name).await {
            Ok(Some(interface)) => interface,
            Ok(None) => {
                warn!("failed to apply {edit}: interface {name} vanished");
                return;
            }
            Err(e) => {
                error!("failed to apply {edit} on {name}: {e:#}");
                return;
            }
        };

        match NetworkConfigService::set_network_config(&self.network, &interface, edit).await {
            Ok(()) => info!("applied {edit} on {name}"),
            Err(e) => error!("failed to apply {edit} on {name}: {e:#}"),
        }
    }

    // ------------------------------------------------------------------------
    // scan and connect
    // ------------------------------------------------------------------------

    /// Clear the scan list, request a scan and schedule collecting its results
    pub async fn start_scan(&mut self, name: &str) -> Result<()> {
        let interface = MenuId::interface(name)?;
        let list = MenuId::scan_list(name);
        if !self.registry.contains(&interface, &list) {
            debug!("not scanning on {name}: scan list not shown");
            return Ok(());
        }

        self.show_list_placeholder(&list, SCANNING)?;
        self.registry.empty_menu(&list);
        self.pending_wifi.reset();

        if let Err(e) = self.network.request_scan(name).await {
            error!("failed to request scan on {name}: {e:#}");
        }

        info!("scan started on {name}");
        self.scheduled_scans.push(name.to_string());

        Ok(())
    }

    /// Fill the scan list with the access points found since [`Self::start_scan`]
    pub async fn finish_scan(&mut self, name: &str) {
        if let Err(e) = self.populate_scan_list(name).await {
            error!("failed to list access points on {name}: {e:#}");
        }
    }

    async fn populate_scan_list(&mut self, name: &str) -> Result<()> {
        let interface = MenuId::interface(name)?;
        let list = MenuId::scan_list(name);
        if !self.registry.contains(&interface, &list) {
            debug!("dropping scan results of {name}: scan list not shown");
            return Ok(());
        }

        let placeholder = self.show_list_placeholder(&list, SCANNING)?;
        self.registry.empty_menu(&list);

        let access_points = match self.network.list_access_points(name).await {
            Ok(access_points) => dedup_by_ssid(access_points),
            Err(e) => {
                self.registry.set_text(&placeholder, NO_NETWORKS);
                return Err(e);
            }
        };

        let mut added = 0;
        for access_point in &access_points {
            let entry = match MenuId::scan_entry(name, &access_point.handle) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping access point {:?}: {e:#}", access_point.ssid);
                    continue;
                }
            };

            self.pending_wifi.remember(access_point);
            self.add_scan_entry(&list, &entry, name, &access_point.handle, &access_point.ssid)?;
            added += 1;
        }

        info!("{added} networks found on {name}");

        if added > 0 {
            self.registry.del_item(&list, &placeholder);
        } else {
            self.registry.set_text(&placeholder, NO_NETWORKS);
        }

        Ok(())
    }

    fn show_list_placeholder(&mut self, list: &MenuId, text: &str) -> Result<MenuId> {
        let placeholder = MenuId::placeholder(list.clone());
        if self.registry.contains(list, &placeholder) {
            self.registry.set_text(&placeholder, text);
        } else {
            self.registry
                .add_item(list, &placeholder, WidgetSpec::action(text))?;
        }
        Ok(placeholder)
    }

    fn add_scan_entry(
        &mut self,
        list: &MenuId,
        entry: &MenuId,
        name: &str,
        handle: &str,
        ssid: &str,
    ) -> Result<()> {
        let field = |field| MenuId::scan_field(name, handle, field);

        self.registry.add_item(list, entry, WidgetSpec::menu(ssid))?;
        self.registry.add_item(
            entry,
            &field(ScanField::Passphrase),
            WidgetSpec::passphrase("Passphrase"),
        )?;
        self.registry
            .add_item(entry, &field(ScanField::Dhcp), WidgetSpec::checkbox("DHCP", true))?;
        self.registry.add_item(
            entry,
            &field(ScanField::Ip),
            WidgetSpec::ip("IP", DEFAULT_IP).hidden(true),
        )?;
        self.registry.add_item(
            entry,
            &field(ScanField::Prefix),
            WidgetSpec::numeric("Prefix", DEFAULT_PREFIX.into(), 0, 32).hidden(true),
        )?;
        self.registry.add_item(
            entry,
            &field(ScanField::Connect),
            WidgetSpec::action("Connect").menu_result(MenuResult::Close),
        )?;

        Ok(())
    }

    fn capture_scan_field(
        &mut self,
        name: &str,
        handle: &str,
        field: ScanField,
        value: Option<&str>,
    ) {
        let Some(value) = value else {
            debug!("ignoring {field} of {name}/{handle} without value");
            return;
        };

        self.pending_wifi.capture(field, value);

        if field == ScanField::Dhcp {
            let hidden = self.pending_wifi.dhcp;
            self.registry
                .set_hidden(&MenuId::scan_field(name, handle, ScanField::Ip), hidden);
            self.registry
                .set_hidden(&MenuId::scan_field(name, handle, ScanField::Prefix), hidden);
        }
    }

    async fn commit_wifi_connect(&mut self, name: &str, handle: &str) -> Result<()> {
        let Some(ssid) = self.pending_wifi.ssid(handle).map(str::to_string) else {
            bail!("failed to connect {name}: unknown access point {handle}");
        };

        let result =
            WifiConnectService::connect(&self.network, name, &ssid, &self.pending_wifi).await;
        self.pending_wifi.clear_edits();

        let outcome = result?;
        info!("wifi profile {ssid:?} on {name}: {outcome:?}");

        Ok(())
    }
}

/// Interfaces that get a main menu entry, in facade order
///
/// Names that cannot be embedded into menu ids are skipped.
fn shown_interfaces(interfaces: Vec<InterfaceState>) -> Vec<InterfaceState> {
    interfaces
        .into_iter()
        .filter(InterfaceState::is_managed)
        .filter(|interface| {
            let valid = crate::menu_id::is_valid_token(&interface.name);
            if !valid {
                warn!("skipping interface {:?}: name not usable in menu ids", interface.name);
            }
            valid
        })
        .collect()
}

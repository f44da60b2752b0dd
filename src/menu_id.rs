//! Structured menu item identifiers
//!
//! LCDd addresses menu items by flat string ids. The menu tree built here
//! encodes its structure into those ids by joining tokens with `_`:
//!
//! ```text
//! eth0                     interface submenu
//! eth0_dhcp                interface option
//! wlan0_list               scan result submenu
//! wlan0_list_<handle>      access point submenu
//! wlan0_list_<handle>_pass access point field
//! <parent>_dummy           placeholder child of <parent>
//! ```
//!
//! `_` is therefore reserved and must never appear inside a token.

use anyhow::{Result, ensure};
use std::fmt;

pub const SEPARATOR: char = '_';

/// Id LCDd reports when the client's own main menu is entered
pub const CLIENT_MENU_ID: &str = "_client_menu_";

const PLACEHOLDER_SUFFIX: &str = "_dummy";
const SCAN_LIST_TOKEN: &str = "list";

/// Option items directly below an interface submenu
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterfaceOption {
    Dhcp,
    Ip,
    Prefix,
    /// read-only display of the connected SSID
    Ssid,
    Disconnect,
    /// read-only display of the leased address
    Lease,
    /// "start access point" submenu
    AccessPoint,
}

/// Fields of one access point entry in the scan list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanField {
    Passphrase,
    Dhcp,
    Ip,
    Prefix,
    Connect,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MenuId {
    /// the client's main menu
    Root,
    /// placeholder child keeping its parent menu non-empty
    Placeholder(Box<MenuId>),
    Interface(String),
    Option {
        interface: String,
        option: InterfaceOption,
    },
    ScanList(String),
    ScanEntry {
        interface: String,
        handle: String,
    },
    ScanField {
        interface: String,
        handle: String,
        field: ScanField,
    },
}

impl InterfaceOption {
    pub fn token(self) -> &'static str {
        match self {
            InterfaceOption::Dhcp => "dhcp",
            InterfaceOption::Ip => "ip",
            InterfaceOption::Prefix => "prefix",
            InterfaceOption::Ssid => "ssid",
            InterfaceOption::Disconnect => "disconnect",
            InterfaceOption::Lease => "lease",
            InterfaceOption::AccessPoint => "ap",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "dhcp" => InterfaceOption::Dhcp,
            "ip" => InterfaceOption::Ip,
            "prefix" => InterfaceOption::Prefix,
            "ssid" => InterfaceOption::Ssid,
            "disconnect" => InterfaceOption::Disconnect,
            "lease" => InterfaceOption::Lease,
            "ap" => InterfaceOption::AccessPoint,
            _ => return None,
        })
    }
}

impl fmt::Display for InterfaceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl ScanField {
    pub fn token(self) -> &'static str {
        match self {
            ScanField::Passphrase => "pass",
            ScanField::Dhcp => "dhcp",
            ScanField::Ip => "ip",
            ScanField::Prefix => "prefix",
            ScanField::Connect => "connect",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "pass" => ScanField::Passphrase,
            "dhcp" => ScanField::Dhcp,
            "ip" => ScanField::Ip,
            "prefix" => ScanField::Prefix,
            "connect" => ScanField::Connect,
            _ => return None,
        })
    }
}

impl fmt::Display for ScanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A token may be embedded into an id without breaking decoding
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && !token.contains(SEPARATOR)
        && !token.contains('"')
        && !token.chars().any(char::is_whitespace)
}

impl MenuId {
    /// Build an interface id, rejecting names that cannot be encoded
    pub fn interface(name: &str) -> Result<Self> {
        ensure!(
            is_valid_token(name),
            "failed to encode interface name {name:?}: reserved characters"
        );
        Ok(MenuId::Interface(name.to_string()))
    }

    /// Build an access point entry id, rejecting handles that cannot be encoded
    pub fn scan_entry(interface: &str, handle: &str) -> Result<Self> {
        ensure!(
            is_valid_token(interface) && is_valid_token(handle),
            "failed to encode access point {handle:?} on {interface:?}: reserved characters"
        );
        Ok(MenuId::ScanEntry {
            interface: interface.to_string(),
            handle: handle.to_string(),
        })
    }

    pub fn option(interface: &str, option: InterfaceOption) -> Self {
        MenuId::Option {
            interface: interface.to_string(),
            option,
        }
    }

    pub fn scan_list(interface: &str) -> Self {
        MenuId::ScanList(interface.to_string())
    }

    pub fn scan_field(interface: &str, handle: &str, field: ScanField) -> Self {
        MenuId::ScanField {
            interface: interface.to_string(),
            handle: handle.to_string(),
            field,
        }
    }

    pub fn placeholder(parent: MenuId) -> Self {
        MenuId::Placeholder(Box::new(parent))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, MenuId::Placeholder(_))
    }

    /// Decode an id received from LCDd
    ///
    /// The checks run in a fixed order: root, placeholder suffix, scan list
    /// suffix, single token, compound tokens. `wlan0_list` is therefore always
    /// a scan list and never an interface.
    pub fn parse(id: &str) -> Option<Self> {
        if id.is_empty() || id == CLIENT_MENU_ID {
            return Some(MenuId::Root);
        }

        if let Some(parent) = id.strip_suffix(PLACEHOLDER_SUFFIX) {
            return MenuId::parse(parent).map(MenuId::placeholder);
        }

        if let Some(interface) = id
            .strip_suffix(SCAN_LIST_TOKEN)
            .and_then(|rest| rest.strip_suffix(SEPARATOR))
        {
            if is_valid_token(interface) {
                return Some(MenuId::scan_list(interface));
            }
        }

        if !id.contains(SEPARATOR) {
            return is_valid_token(id).then(|| MenuId::Interface(id.to_string()));
        }

        let tokens: Vec<&str> = id.split(SEPARATOR).collect();
        if !tokens.iter().all(|token| is_valid_token(token)) {
            return None;
        }

        match tokens.as_slice() {
            [interface, option] => InterfaceOption::from_token(option)
                .map(|option| MenuId::option(interface, option)),
            [interface, SCAN_LIST_TOKEN, handle] => Some(MenuId::ScanEntry {
                interface: interface.to_string(),
                handle: handle.to_string(),
            }),
            [interface, SCAN_LIST_TOKEN, handle, field] => {
                ScanField::from_token(field).map(|field| MenuId::scan_field(interface, handle, field))
            }
            _ => None,
        }
    }
}

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuId::Root => Ok(()),
            MenuId::Placeholder(parent) => write!(f, "{parent}{PLACEHOLDER_SUFFIX}"),
            MenuId::Interface(interface) => f.write_str(interface),
            MenuId::Option { interface, option } => write!(f, "{interface}{SEPARATOR}{option}"),
            MenuId::ScanList(interface) => write!(f, "{interface}{SEPARATOR}{SCAN_LIST_TOKEN}"),
            MenuId::ScanEntry { interface, handle } => {
                write!(f, "{interface}{SEPARATOR}{SCAN_LIST_TOKEN}{SEPARATOR}{handle}")
            }
            MenuId::ScanField {
                interface,
                handle,
                field,
            } => write!(
                f,
                "{interface}{SEPARATOR}{SCAN_LIST_TOKEN}{SEPARATOR}{handle}{SEPARATOR}{field}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod encode {
        use super::*;

        #[test]
        fn root_is_empty() {
            assert_eq!(MenuId::Root.to_string(), "");
        }

        #[test]
        fn compound_ids_join_tokens() {
            assert_eq!(
                MenuId::option("eth0", InterfaceOption::Dhcp).to_string(),
                "eth0_dhcp"
            );
            assert_eq!(MenuId::scan_list("wlan0").to_string(), "wlan0_list");
            assert_eq!(
                MenuId::scan_field("wlan0", "a0b1c2d3e4f5", ScanField::Passphrase).to_string(),
                "wlan0_list_a0b1c2d3e4f5_pass"
            );
        }

        #[test]
        fn placeholders_append_suffix() {
            assert_eq!(MenuId::placeholder(MenuId::Root).to_string(), "_dummy");
            assert_eq!(
                MenuId::placeholder(MenuId::scan_list("wlan0")).to_string(),
                "wlan0_list_dummy"
            );
        }

        #[test]
        fn rejects_reserved_characters() {
            assert!(MenuId::interface("veth_1").is_err());
            assert!(MenuId::interface("").is_err());
            assert!(MenuId::interface("eth 0").is_err());
            assert!(MenuId::scan_entry("wlan0", "ab_cd").is_err());
            assert!(MenuId::interface("eth0").is_ok());
        }
    }

    mod decode {
        use super::*;

        #[test]
        fn root_ids() {
            assert_eq!(MenuId::parse(""), Some(MenuId::Root));
            assert_eq!(MenuId::parse(CLIENT_MENU_ID), Some(MenuId::Root));
        }

        #[test]
        fn scan_list_wins_over_interface() {
            assert_eq!(MenuId::parse("wlan0_list"), Some(MenuId::scan_list("wlan0")));
        }

        #[test]
        fn single_token_is_interface() {
            assert_eq!(
                MenuId::parse("eth0"),
                Some(MenuId::Interface("eth0".to_string()))
            );
            assert_eq!(
                MenuId::parse("list"),
                Some(MenuId::Interface("list".to_string()))
            );
        }

        #[test]
        fn placeholder_suffix_is_checked_first() {
            assert_eq!(
                MenuId::parse("wlan0_list_dummy"),
                Some(MenuId::placeholder(MenuId::scan_list("wlan0")))
            );
            assert_eq!(
                MenuId::parse("_dummy"),
                Some(MenuId::placeholder(MenuId::Root))
            );
            assert!(MenuId::parse("eth0_dummy").is_some_and(|id| id.is_placeholder()));
        }

        #[test]
        fn scan_entries_and_fields() {
            assert_eq!(
                MenuId::parse("wlan0_list_0a1b"),
                Some(MenuId::ScanEntry {
                    interface: "wlan0".to_string(),
                    handle: "0a1b".to_string(),
                })
            );
            assert_eq!(
                MenuId::parse("wlan0_list_0a1b_connect"),
                Some(MenuId::scan_field("wlan0", "0a1b", ScanField::Connect))
            );
        }

        #[test]
        fn unknown_shapes_are_rejected() {
            assert_eq!(MenuId::parse("eth0_bogus"), None);
            assert_eq!(MenuId::parse("eth0__dhcp"), None);
            assert_eq!(MenuId::parse("wlan0_list_0a1b_bogus"), None);
            assert_eq!(MenuId::parse("a_b_c_d_e"), None);
            assert_eq!(MenuId::parse("eth0_dhcp extra"), None);
        }

        #[test]
        fn every_built_id_decodes_to_itself() {
            let ids = [
                MenuId::Root,
                MenuId::Interface("eth0".to_string()),
                MenuId::option("wlan0", InterfaceOption::AccessPoint),
                MenuId::scan_list("wlan0"),
                MenuId::scan_field("wlan0", "f00d", ScanField::Dhcp),
                MenuId::placeholder(MenuId::option("wlan0", InterfaceOption::AccessPoint)),
            ];
            for id in ids {
                assert_eq!(MenuId::parse(&id.to_string()), Some(id));
            }
        }
    }
}

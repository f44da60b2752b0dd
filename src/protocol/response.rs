use crate::menu_id::MenuId;
use log::warn;
use semver::{Version, VersionReq};
use std::{fmt, sync::OnceLock};

/// Protocol version that introduced client menus
const REQUIRED_PROTOCOL_VERSION: &str = ">=0.3.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuEventKind {
    Enter,
    Leave,
    Update,
    Select,
    Plus,
    Minus,
}

impl MenuEventKind {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "enter" => MenuEventKind::Enter,
            "leave" => MenuEventKind::Leave,
            "update" => MenuEventKind::Update,
            "select" => MenuEventKind::Select,
            "plus" => MenuEventKind::Plus,
            "minus" => MenuEventKind::Minus,
            _ => return None,
        })
    }
}

impl fmt::Display for MenuEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuEventKind::Enter => "enter",
            MenuEventKind::Leave => "leave",
            MenuEventKind::Update => "update",
            MenuEventKind::Select => "select",
            MenuEventKind::Plus => "plus",
            MenuEventKind::Minus => "minus",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuEvent {
    pub kind: MenuEventKind,
    pub id: MenuId,
    /// new value of `update` events; may contain spaces
    pub value: Option<String>,
}

/// Contents of the `connect` greeting
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub server: Option<String>,
    pub protocol: Option<String>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub cell_width: Option<u16>,
    pub cell_height: Option<u16>,
}

impl ServerInfo {
    fn parse(args: &str) -> Self {
        let mut info = ServerInfo::default();
        let mut server = Vec::new();
        let mut tokens = args.split_whitespace();

        while let Some(token) = tokens.next() {
            match token {
                "protocol" => info.protocol = tokens.next().map(str::to_string),
                "lcd" => {}
                "wid" => info.width = tokens.next().and_then(|v| v.parse().ok()),
                "hgt" => info.height = tokens.next().and_then(|v| v.parse().ok()),
                "cellwid" => info.cell_width = tokens.next().and_then(|v| v.parse().ok()),
                "cellhgt" => info.cell_height = tokens.next().and_then(|v| v.parse().ok()),
                other if info.protocol.is_none() => server.push(other),
                _ => {}
            }
        }

        if !server.is_empty() {
            info.server = Some(server.join(" "));
        }

        info
    }

    fn required_version() -> &'static VersionReq {
        static REQUIRED_VERSION: OnceLock<VersionReq> = OnceLock::new();
        REQUIRED_VERSION.get_or_init(|| {
            VersionReq::parse(REQUIRED_PROTOCOL_VERSION)
                .expect("invalid REQUIRED_PROTOCOL_VERSION constant")
        })
    }

    /// Whether the announced protocol version supports client menus
    ///
    /// LCDd announces two component versions (`0.3`), which are padded to
    /// semver before matching. Unknown or unparsable versions count as
    /// supported.
    pub fn supports_menus(&self) -> bool {
        let Some(protocol) = &self.protocol else {
            return true;
        };

        let mut parts: Vec<&str> = protocol.split('.').collect();
        while parts.len() < 3 {
            parts.push("0");
        }

        match Version::parse(&parts.join(".")) {
            Ok(version) => Self::required_version().matches(&version),
            Err(e) => {
                warn!("failed to parse protocol version {protocol:?}: {e}");
                true
            }
        }
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (protocol {}",
            self.server.as_deref().unwrap_or("unknown server"),
            self.protocol.as_deref().unwrap_or("?")
        )?;
        if let (Some(width), Some(height)) = (self.width, self.height) {
            write!(f, ", {width}x{height}")?;
        }
        f.write_str(")")
    }
}

/// One decoded inbound line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Connect(ServerInfo),
    MenuEvent(MenuEvent),
    /// `huh?` error report for a previous command
    Error(String),
    Listen(String),
    Ignore(String),
    Unrecognized(String),
}

impl Response {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches('\r');
        let (keyword, args) = line.split_once(' ').unwrap_or((line, ""));

        match keyword {
            "connect" => Response::Connect(ServerInfo::parse(args)),
            "menuevent" => Self::parse_menu_event(args)
                .map(Response::MenuEvent)
                .unwrap_or_else(|| Response::Unrecognized(line.to_string())),
            "huh?" => Response::Error(args.trim().to_string()),
            "listen" => Response::Listen(args.trim().to_string()),
            "ignore" => Response::Ignore(args.trim().to_string()),
            _ => Response::Unrecognized(line.to_string()),
        }
    }

    fn parse_menu_event(args: &str) -> Option<MenuEvent> {
        let mut parts = args.splitn(3, ' ');
        let kind = MenuEventKind::parse(parts.next()?)?;
        let id = MenuId::parse(parts.next()?)?;
        let value = parts.next().map(str::to_string);

        Some(MenuEvent { kind, id, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu_id::{InterfaceOption, ScanField};

    mod greeting {
        use super::*;

        #[test]
        fn parses_lcdproc_greeting() {
            let response =
                Response::parse("connect LCDproc 0.5.9 protocol 0.3 lcd wid 20 hgt 4 cellwid 5 cellhgt 8");
            let Response::Connect(info) = response else {
                panic!("expected greeting");
            };
            assert_eq!(info.server.as_deref(), Some("LCDproc 0.5.9"));
            assert_eq!(info.protocol.as_deref(), Some("0.3"));
            assert_eq!(info.width, Some(20));
            assert_eq!(info.height, Some(4));
            assert_eq!(info.cell_width, Some(5));
            assert_eq!(info.cell_height, Some(8));
            assert!(info.supports_menus());
        }

        #[test]
        fn old_protocol_has_no_menus() {
            let Response::Connect(info) = Response::parse("connect LCDproc 0.4.5 protocol 0.2 lcd wid 16 hgt 2")
            else {
                panic!("expected greeting");
            };
            assert!(!info.supports_menus());
        }

        #[test]
        fn missing_protocol_counts_as_supported() {
            let Response::Connect(info) = Response::parse("connect") else {
                panic!("expected greeting");
            };
            assert_eq!(info, ServerInfo::default());
            assert!(info.supports_menus());
        }
    }

    mod menu_events {
        use super::*;

        #[test]
        fn enter_scan_list() {
            assert_eq!(
                Response::parse("menuevent enter wlan0_list"),
                Response::MenuEvent(MenuEvent {
                    kind: MenuEventKind::Enter,
                    id: MenuId::scan_list("wlan0"),
                    value: None,
                })
            );
        }

        #[test]
        fn update_keeps_spaces_in_value() {
            assert_eq!(
                Response::parse("menuevent update wlan0_list_ab12_pass my secret pass"),
                Response::MenuEvent(MenuEvent {
                    kind: MenuEventKind::Update,
                    id: MenuId::scan_field("wlan0", "ab12", ScanField::Passphrase),
                    value: Some("my secret pass".to_string()),
                })
            );
        }

        #[test]
        fn select_option() {
            assert_eq!(
                Response::parse("menuevent select wlan0_disconnect\r"),
                Response::MenuEvent(MenuEvent {
                    kind: MenuEventKind::Select,
                    id: MenuId::option("wlan0", InterfaceOption::Disconnect),
                    value: None,
                })
            );
        }

        #[test]
        fn unknown_ids_and_kinds_are_unrecognized() {
            assert!(matches!(
                Response::parse("menuevent enter eth0_bogus"),
                Response::Unrecognized(_)
            ));
            assert!(matches!(
                Response::parse("menuevent wiggle eth0"),
                Response::Unrecognized(_)
            ));
            assert!(matches!(Response::parse("menuevent"), Response::Unrecognized(_)));
        }
    }

    #[test]
    fn error_and_screen_notices() {
        assert_eq!(
            Response::parse("huh? Unknown item id"),
            Response::Error("Unknown item id".to_string())
        );
        assert_eq!(
            Response::parse("listen screen1"),
            Response::Listen("screen1".to_string())
        );
        assert_eq!(
            Response::parse("ignore screen1"),
            Response::Ignore("screen1".to_string())
        );
        assert_eq!(
            Response::parse("bye"),
            Response::Unrecognized("bye".to_string())
        );
    }
}

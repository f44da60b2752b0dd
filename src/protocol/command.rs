use super::widget::WidgetSpec;
use std::fmt;

/// Attribute changed by a `menu_set_item` command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemAttribute {
    Text(String),
    Hidden(bool),
}

/// One outbound protocol line
///
/// Text arguments are wrapped in double quotes but not escaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Hello,
    ClientSet {
        name: String,
    },
    MenuAddItem {
        parent: String,
        id: String,
        spec: WidgetSpec,
    },
    /// LCDd ignores the parent argument of `menu_del_item`, so it is always `""`
    MenuDelItem {
        id: String,
    },
    MenuSetItem {
        id: String,
        attribute: ItemAttribute,
    },
}

impl Command {
    /// Render the command as one newline terminated line
    pub fn encode(&self) -> Vec<u8> {
        format!("{self}\n").into_bytes()
    }

    /// Id of the menu item this command touches
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Command::Hello | Command::ClientSet { .. } => None,
            Command::MenuAddItem { id, .. }
            | Command::MenuDelItem { id }
            | Command::MenuSetItem { id, .. } => Some(id.as_str()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Hello => f.write_str("hello"),
            Command::ClientSet { name } => write!(f, "client_set -name \"{name}\""),
            Command::MenuAddItem { parent, id, spec } => {
                write!(f, "menu_add_item \"{parent}\" \"{id}\" {spec}")
            }
            Command::MenuDelItem { id } => write!(f, "menu_del_item \"\" \"{id}\""),
            Command::MenuSetItem {
                id,
                attribute: ItemAttribute::Text(text),
            } => write!(f, "menu_set_item \"\" \"{id}\" -text \"{text}\""),
            Command::MenuSetItem {
                id,
                attribute: ItemAttribute::Hidden(hidden),
            } => write!(f, "menu_set_item \"\" \"{id}\" -is_hidden {hidden}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_and_client_name() {
        assert_eq!(Command::Hello.encode(), b"hello\n");
        assert_eq!(
            Command::ClientSet {
                name: "Netzwerk".to_string()
            }
            .to_string(),
            "client_set -name \"Netzwerk\""
        );
    }

    #[test]
    fn add_item_quotes_parent_and_id() {
        let command = Command::MenuAddItem {
            parent: String::new(),
            id: "eth0".to_string(),
            spec: WidgetSpec::menu("eth0"),
        };
        assert_eq!(command.to_string(), "menu_add_item \"\" \"eth0\" menu \"eth0\"");
        assert_eq!(command.item_id(), Some("eth0"));
    }

    #[test]
    fn delete_uses_constant_parent() {
        assert_eq!(
            Command::MenuDelItem {
                id: "wlan0".to_string()
            }
            .encode(),
            b"menu_del_item \"\" \"wlan0\"\n"
        );
    }

    #[test]
    fn set_item_attributes() {
        assert_eq!(
            Command::MenuSetItem {
                id: "eth0".to_string(),
                attribute: ItemAttribute::Text("eth0 up".to_string()),
            }
            .to_string(),
            "menu_set_item \"\" \"eth0\" -text \"eth0 up\""
        );
        assert_eq!(
            Command::MenuSetItem {
                id: "wlan0_list_ab_ip".to_string(),
                attribute: ItemAttribute::Hidden(false),
            }
            .to_string(),
            "menu_set_item \"\" \"wlan0_list_ab_ip\" -is_hidden false"
        );
    }

    #[test]
    fn embedded_quotes_are_passed_through() {
        let command = Command::MenuAddItem {
            parent: "wlan0_list".to_string(),
            id: "wlan0_list_ab".to_string(),
            spec: WidgetSpec::menu("Joe's \"Net\""),
        };
        assert!(command.to_string().ends_with("menu \"Joe's \"Net\"\""));
    }
}

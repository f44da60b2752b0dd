use std::{fmt, net::Ipv4Addr};

/// Characters besides letters and digits accepted in passphrase fields.
/// `"` and `\` are left out since text arguments are sent unescaped.
const PASSPHRASE_EXTRA_CHARS: &str = " !#$%&'()*+,-./:;<=>?@[]^_`{|}~";

/// What LCDd does after an action item was selected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuResult {
    Close,
}

impl fmt::Display for MenuResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuResult::Close => "close",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Widget {
    Action {
        result: Option<MenuResult>,
    },
    Checkbox {
        checked: bool,
    },
    Ip {
        value: Ipv4Addr,
    },
    Numeric {
        value: i64,
        min: i64,
        max: i64,
    },
    Alpha {
        value: String,
        min_length: u16,
        max_length: u16,
    },
    Menu,
}

/// Type specific arguments of a `menu_add_item` command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetSpec {
    text: String,
    widget: Widget,
    hidden: bool,
}

impl WidgetSpec {
    fn new(text: impl Into<String>, widget: Widget) -> Self {
        WidgetSpec {
            text: text.into(),
            widget,
            hidden: false,
        }
    }

    pub fn action(text: impl Into<String>) -> Self {
        Self::new(text, Widget::Action { result: None })
    }

    pub fn checkbox(text: impl Into<String>, checked: bool) -> Self {
        Self::new(text, Widget::Checkbox { checked })
    }

    pub fn ip(text: impl Into<String>, value: Ipv4Addr) -> Self {
        Self::new(text, Widget::Ip { value })
    }

    pub fn numeric(text: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self::new(text, Widget::Numeric { value, min, max })
    }

    /// WPA passphrase entry (8 to 63 characters, empty for open networks)
    pub fn passphrase(text: impl Into<String>) -> Self {
        Self::new(
            text,
            Widget::Alpha {
                value: String::new(),
                min_length: 0,
                max_length: 63,
            },
        )
    }

    pub fn menu(text: impl Into<String>) -> Self {
        Self::new(text, Widget::Menu)
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn menu_result(mut self, menu_result: MenuResult) -> Self {
        if let Widget::Action { result } = &mut self.widget {
            *result = Some(menu_result);
        }
        self
    }
}

impl fmt::Display for WidgetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = &self.text;

        match &self.widget {
            Widget::Action { result } => {
                write!(f, "action \"{text}\"")?;
                if let Some(result) = result {
                    write!(f, " -menu_result {result}")?;
                }
            }
            Widget::Checkbox { checked } => {
                let value = if *checked { "on" } else { "off" };
                write!(f, "checkbox \"{text}\" -value {value}")?;
            }
            Widget::Ip { value } => {
                write!(f, "ip \"{text}\" -v6 false -value \"{value}\"")?;
            }
            Widget::Numeric { value, min, max } => {
                write!(
                    f,
                    "numeric \"{text}\" -value {value} -minvalue {min} -maxvalue {max}"
                )?;
            }
            Widget::Alpha {
                value,
                min_length,
                max_length,
            } => {
                write!(
                    f,
                    "alpha \"{text}\" -value \"{value}\" -minlength {min_length} -maxlength {max_length} \
                     -allow_caps true -allow_noncaps true -allow_numbers true \
                     -allowed_extra \"{PASSPHRASE_EXTRA_CHARS}\""
                )?;
            }
            Widget::Menu => write!(f, "menu \"{text}\"")?,
        }

        if self.hidden {
            f.write_str(" -is_hidden true")?;
        }

        Ok(())
    }
}

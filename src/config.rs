use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// LCDd connection configuration
    pub lcdd: LcddConfig,

    /// Menu refresh and scan timing
    pub menu: MenuConfig,

    /// NetworkManager command line client configuration
    pub nmcli: NmcliConfig,
}

#[derive(Clone, Debug)]
pub struct LcddConfig {
    pub address: String,
    pub client_name: String,
    /// `None` means the process exits once the daemon connection is gone
    pub reconnect_delay: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct MenuConfig {
    /// `None` disables the periodic main menu refresh
    pub refresh_interval: Option<Duration>,
    pub scan_settle: Duration,
}

#[derive(Clone, Debug)]
pub struct NmcliConfig {
    pub binary_path: PathBuf,
}

/// Subset of the configuration a single daemon session needs
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub client_name: String,
    pub refresh_interval: Option<Duration>,
    pub scan_settle: Duration,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it loads
    /// and validates all configuration from environment variables. Subsequent
    /// calls return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. This is intentional as the
    /// application cannot function without valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| {
            Self::load_internal().expect("failed to load application configuration")
        })
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            client_name: self.lcdd.client_name.clone(),
            refresh_interval: self.menu.refresh_interval,
            scan_settle: self.menu.scan_settle,
        }
    }

    fn load_internal() -> Result<Self> {
        let lcdd = LcddConfig::load()?;
        let menu = MenuConfig::load()?;
        let nmcli = NmcliConfig::load()?;

        Ok(Self { lcdd, menu, nmcli })
    }
}

impl LcddConfig {
    fn load() -> Result<Self> {
        let address = env::var("LCDD_ADDRESS").unwrap_or_else(|_| "127.0.0.1:13666".to_string());
        let client_name = env::var("LCD_CLIENT_NAME").unwrap_or_else(|_| "Netzwerk".to_string());
        let reconnect_delay = optional_secs(
            &env::var("LCD_RECONNECT_DELAY_SECS").unwrap_or_else(|_| "5".to_string()),
        )
        .context("failed to parse LCD_RECONNECT_DELAY_SECS: invalid format")?;

        Ok(Self {
            address,
            client_name,
            reconnect_delay,
        })
    }
}

impl MenuConfig {
    fn load() -> Result<Self> {
        let refresh_interval = optional_secs(
            &env::var("MENU_REFRESH_INTERVAL_SECS").unwrap_or_else(|_| "10".to_string()),
        )
        .context("failed to parse MENU_REFRESH_INTERVAL_SECS: invalid format")?;

        let scan_settle = env::var("WIFI_SCAN_SETTLE_MS")
            .unwrap_or_else(|_| "4000".to_string())
            .parse::<u64>()
            .map(Duration::from_millis)
            .context("failed to parse WIFI_SCAN_SETTLE_MS: invalid format")?;

        Ok(Self {
            refresh_interval,
            scan_settle,
        })
    }
}

impl NmcliConfig {
    fn load() -> Result<Self> {
        let binary_path = env::var("NMCLI_PATH")
            .unwrap_or_else(|_| "nmcli".to_string())
            .into();

        Ok(Self { binary_path })
    }
}

/// Parse a number of seconds where `0` means "disabled"
fn optional_secs(value: &str) -> Result<Option<Duration>> {
    let secs = value.trim().parse::<u64>()?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

use crate::errors::{AppError, AppResult};
use crate::report::ReportConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "ride-insights.yaml";
pub const KEYRING_SERVICE: &str = "ride-insights";
const ENV_PREFIX: &str = "RIDE_INSIGHTS_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    #[default]
    Sqlite,
    Mysql,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
        }
    }

    fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            other => Err(AppError::Config(format!("unknown database backend '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: Backend,
    /// SQLite database file; ignored by server backends.
    pub path: PathBuf,
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub port: u16,
    pub ssl: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: PathBuf::from("rides.db"),
            host: "127.0.0.1".to_string(),
            user: "root".to_string(),
            password: None,
            database: "ola".to_string(),
            port: 3306,
            ssl: false,
        }
    }
}

impl DatabaseConfig {
    /// Explicit config or environment first, then the OS keyring entry for `user`.
    pub fn resolve_password(&self) -> Option<String> {
        self.resolve_password_with(keyring_password)
    }

    /// `fallback` receives the keyring service and the database user.
    pub fn resolve_password_with<F>(&self, fallback: F) -> Option<String>
    where
        F: FnOnce(&str, &str) -> Option<String>,
    {
        if let Some(password) = self.password.as_ref().filter(|value| !value.is_empty()) {
            return Some(password.clone());
        }
        fallback(KEYRING_SERVICE, &self.user).filter(|value| !value.is_empty())
    }
}

fn keyring_password(service: &str, user: &str) -> Option<String> {
    let entry = match keyring::Entry::new(service, user) {
        Ok(entry) => entry,
        Err(error) => {
            tracing::debug!(error = %error, "keyring unavailable");
            return None;
        }
    };
    match entry.get_password() {
        Ok(password) => Some(password),
        Err(keyring::Error::NoEntry) => None,
        Err(error) => {
            tracing::debug!(error = %error, user = %user, "keyring lookup failed");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NamingPreset {
    /// `booking_status`, `ride_distance`, ... as exported to MySQL-compatible stores.
    #[default]
    Lowercase,
    /// `Booking_Status`, `Ride_Distance`, ... as imported into SQL Server.
    Capitalized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOverrides {
    pub date: Option<String>,
    pub booking_id: Option<String>,
    pub booking_status: Option<String>,
    pub vehicle_type: Option<String>,
    pub booking_value: Option<String>,
    pub payment_method: Option<String>,
    pub ride_distance: Option<String>,
    pub driver_ratings: Option<String>,
    pub customer_rating: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub preset: NamingPreset,
    pub table: String,
    pub columns: ColumnOverrides,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            preset: NamingPreset::Lowercase,
            table: "ola_rides_july_clean".to_string(),
            columns: ColumnOverrides::default(),
        }
    }
}

/// Concrete table and column names of the base table for one backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub table: String,
    pub date: String,
    pub booking_id: String,
    pub booking_status: String,
    pub vehicle_type: String,
    pub booking_value: String,
    pub payment_method: String,
    pub ride_distance: String,
    pub driver_ratings: String,
    pub customer_rating: String,
}

impl ColumnMapping {
    pub fn lowercase(table: &str) -> Self {
        Self {
            table: table.to_string(),
            date: "date".to_string(),
            booking_id: "booking_id".to_string(),
            booking_status: "booking_status".to_string(),
            vehicle_type: "vehicle_type".to_string(),
            booking_value: "booking_value".to_string(),
            payment_method: "payment_method".to_string(),
            ride_distance: "ride_distance".to_string(),
            driver_ratings: "driver_ratings".to_string(),
            customer_rating: "customer_rating".to_string(),
        }
    }

    pub fn capitalized(table: &str) -> Self {
        Self {
            table: table.to_string(),
            date: "Date".to_string(),
            booking_id: "Booking_ID".to_string(),
            booking_status: "Booking_Status".to_string(),
            vehicle_type: "Vehicle_Type".to_string(),
            booking_value: "Booking_Value".to_string(),
            payment_method: "Payment_Method".to_string(),
            ride_distance: "Ride_Distance".to_string(),
            driver_ratings: "Driver_Ratings".to_string(),
            customer_rating: "Customer_Rating".to_string(),
        }
    }

    pub fn columns(&self) -> [&str; 9] {
        [
            self.date.as_str(),
            self.booking_id.as_str(),
            self.booking_status.as_str(),
            self.vehicle_type.as_str(),
            self.booking_value.as_str(),
            self.payment_method.as_str(),
            self.ride_distance.as_str(),
            self.driver_ratings.as_str(),
            self.customer_rating.as_str(),
        ]
    }

    pub fn base_table_sql(&self) -> String {
        format!("SELECT {} FROM {}", self.columns().join(", "), self.table)
    }
}

impl SchemaConfig {
    pub fn mapping(&self) -> ColumnMapping {
        let mut mapping = match self.preset {
            NamingPreset::Lowercase => ColumnMapping::lowercase(&self.table),
            NamingPreset::Capitalized => ColumnMapping::capitalized(&self.table),
        };

        let overrides = &self.columns;
        let slots = [
            (&mut mapping.date, &overrides.date),
            (&mut mapping.booking_id, &overrides.booking_id),
            (&mut mapping.booking_status, &overrides.booking_status),
            (&mut mapping.vehicle_type, &overrides.vehicle_type),
            (&mut mapping.booking_value, &overrides.booking_value),
            (&mut mapping.payment_method, &overrides.payment_method),
            (&mut mapping.ride_distance, &overrides.ride_distance),
            (&mut mapping.driver_ratings, &overrides.driver_ratings),
            (&mut mapping.customer_rating, &overrides.customer_rating),
        ];
        for (slot, value) in slots {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        mapping
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub success_status: String,
    pub cache_ttl_seconds: u64,
    pub queries_path: PathBuf,
    pub currency_symbol: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            success_status: "Success".to_string(),
            cache_ttl_seconds: 600,
            queries_path: PathBuf::from("sqlquery1.sql"),
            currency_symbol: "₹".to_string(),
        }
    }
}

impl DashboardSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub schema: SchemaConfig,
    pub dashboard: DashboardSettings,
    pub report: ReportConfig,
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            schema: SchemaConfig::default(),
            dashboard: DashboardSettings::default(),
            report: ReportConfig::default(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Reads an explicit config file, or `ride-insights.yaml` in the working directory when
    /// present, then applies `RIDE_INSIGHTS_*` environment overrides and validates.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("config file {}", path.display()))
            } else {
                AppError::Io(format!("failed to read {}: {}", path.display(), error))
            }
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> AppResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.is_empty());

        if let Some(value) = var("DB_BACKEND") {
            self.database.backend = Backend::parse(&value)?;
        }
        if let Some(value) = var("DB_PATH") {
            self.database.path = PathBuf::from(value);
        }
        if let Some(value) = var("DB_HOST") {
            self.database.host = value;
        }
        if let Some(value) = var("DB_USER") {
            self.database.user = value;
        }
        if let Some(value) = var("DB_PASSWORD") {
            self.database.password = Some(value);
        }
        if let Some(value) = var("DB_NAME") {
            self.database.database = value;
        }
        if let Some(value) = var("DB_PORT") {
            self.database.port = value
                .parse()
                .map_err(|_| AppError::Config(format!("invalid port '{}'", value)))?;
        }
        if let Some(value) = var("DB_SSL") {
            self.database.ssl = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(value) = var("QUERIES_PATH") {
            self.dashboard.queries_path = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.schema.table.trim().is_empty() {
            return Err(AppError::Config("schema.table must not be empty".to_string()));
        }
        if self.dashboard.success_status.is_empty() {
            return Err(AppError::Config("dashboard.success_status must not be empty".to_string()));
        }
        if self.dashboard.cache_ttl_seconds == 0 {
            return Err(AppError::Config("dashboard.cache_ttl_seconds must be positive".to_string()));
        }
        if self.database.backend == Backend::Mysql && self.database.host.trim().is_empty() {
            return Err(AppError::Config("database.host is required for the mysql backend".to_string()));
        }
        Ok(())
    }
}

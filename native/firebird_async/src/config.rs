/// Configuration for the async adapter and its compensation dialect
///
/// Each supported blocking driver family has a preset ([`DriverVariant`]).
/// Presets can be overridden field by field from TOML:
///
/// ```toml
/// variant = "fdb"
/// ddl_fixup = "commit"
///
/// [disconnect]
/// codes = [335546001, 335544721]
/// messages = ["Error writing data to the connection"]
/// ```
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{DEFAULT_DISCONNECT_CODES, DEFAULT_DISCONNECT_MESSAGES};
use crate::cursor::CursorOptions;
use crate::error::{Error, Result};

/// Blocking driver families the dialect knows how to compensate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverVariant {
    /// The `fdb` client-library driver.
    #[default]
    Fdb,
    /// The `firebird-driver` client-library driver.
    FirebirdDriver,
    /// The pure wire-protocol `firebirdsql` driver.
    FirebirdSql,
}

impl DriverVariant {
    /// Registered dialect name.
    pub fn dialect_name(self) -> &'static str {
        match self {
            DriverVariant::Fdb => "firebird.fdb_async",
            DriverVariant::FirebirdDriver => "firebird.firebird_async",
            DriverVariant::FirebirdSql => "firebird.firebirdsql_async",
        }
    }

    /// Async URL scheme.
    pub fn scheme(self) -> &'static str {
        match self {
            DriverVariant::Fdb => "firebird+fdb_async",
            DriverVariant::FirebirdDriver => "firebird+firebird_async",
            DriverVariant::FirebirdSql => "firebird+firebirdsql_async",
        }
    }

    /// Recognize the variant from a database URL, including the legacy
    /// synchronous and alias schemes. A bare `firebird://` means `fdb`.
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once("://")?;
        match scheme.to_ascii_lowercase().as_str() {
            "firebird" | "firebird+fdb" | "firebird+fdb_async" | "firebird+async_fdb" => {
                Some(DriverVariant::Fdb)
            }
            "firebird+firebird_async" => Some(DriverVariant::FirebirdDriver),
            "firebird+firebirdsql"
            | "firebird+firebirdsql_async"
            | "firebird+pyfb"
            | "firebird+async_pyfb" => Some(DriverVariant::FirebirdSql),
            _ => None,
        }
    }

    /// Rewrite a database URL to this crate's async scheme. URLs that are
    /// not Firebird URLs are returned unchanged.
    pub fn to_async_url(url: &str) -> String {
        match (Self::from_url(url), url.split_once("://")) {
            (Some(variant), Some((_, rest))) => format!("{}://{rest}", variant.scheme()),
            _ => url.to_string(),
        }
    }
}

/// What to do after a schema-definition statement so later statements on
/// the same connection see the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlFixup {
    None,
    /// Commit on the driver connection.
    Commit,
    /// Close the statement cursor (errors ignored), commit, then begin a
    /// new transaction.
    CloseCommitBegin,
}

/// Error codes and message fragments that mark a lost connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisconnectRules {
    pub codes: Vec<i64>,
    pub messages: Vec<String>,
}

impl Default for DisconnectRules {
    fn default() -> Self {
        Self {
            codes: DEFAULT_DISCONNECT_CODES.to_vec(),
            messages: DEFAULT_DISCONNECT_MESSAGES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub variant: DriverVariant,
    /// Allocate a one-thread pool for the connect handshake and keep it for
    /// the connection's later calls.
    pub dedicated_connect_pool: bool,
    pub normalize_rowcount: bool,
    /// `fetchmany` default; `None` keeps the driver's `arraysize`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arraysize: Option<usize>,
    pub ddl_fixup: DdlFixup,
    /// Emulate `executemany` for INSERT ... RETURNING with a per-row loop.
    pub emulate_executemany_returning: bool,
    pub disconnect: DisconnectRules,
}

impl BridgeConfig {
    /// Preset for a driver family.
    pub fn for_variant(variant: DriverVariant) -> Self {
        match variant {
            DriverVariant::Fdb => Self {
                variant,
                dedicated_connect_pool: true,
                normalize_rowcount: true,
                arraysize: None,
                ddl_fixup: DdlFixup::CloseCommitBegin,
                emulate_executemany_returning: false,
                disconnect: DisconnectRules::default(),
            },
            DriverVariant::FirebirdDriver => Self {
                variant,
                dedicated_connect_pool: false,
                normalize_rowcount: true,
                arraysize: None,
                ddl_fixup: DdlFixup::Commit,
                emulate_executemany_returning: true,
                disconnect: DisconnectRules::default(),
            },
            DriverVariant::FirebirdSql => Self {
                variant,
                dedicated_connect_pool: false,
                normalize_rowcount: true,
                arraysize: None,
                ddl_fixup: DdlFixup::Commit,
                emulate_executemany_returning: true,
                disconnect: DisconnectRules::default(),
            },
        }
    }

    /// Parse a TOML document. Fields that are not given keep the preset of
    /// the document's `variant` (default `fdb`).
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(s)?;
        let variant = match table.get("variant") {
            Some(v) => v.clone().try_into::<DriverVariant>()?,
            None => DriverVariant::default(),
        };

        let mut merged = match toml::Value::try_from(Self::for_variant(variant)) {
            Ok(toml::Value::Table(preset)) => preset,
            Ok(_) => return Err(Error::Config("preset is not a table".to_string())),
            Err(e) => return Err(Error::Config(e.to_string())),
        };
        for (key, value) in table {
            merged.insert(key, value);
        }
        let config: Self = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.arraysize == Some(0) {
            return Err(Error::Config("arraysize must be at least 1".to_string()));
        }
        if self.disconnect.messages.iter().any(String::is_empty) {
            return Err(Error::Config(
                "disconnect messages must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cursor_options(&self) -> CursorOptions {
        CursorOptions {
            normalize_rowcount: self.normalize_rowcount,
            arraysize: self.arraysize,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::for_variant(DriverVariant::default())
    }
}

/*!
 * Connection Options
 *
 * A connection is configured by exactly six options. They live in a plain
 * struct with named fields; the string-keyed form (`OptionName` plus
 * `OptionValue`) exists for callers that build configuration from maps or
 * command-line pairs, and funnels through one validation path.
 */

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default server port - Redis-compatible port 6379
pub const DEFAULT_PORT: u16 = 6379;
/// Default weight used by external load distribution
pub const DEFAULT_WEIGHT: u32 = 1;

/// Names of the recognised options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    Host,
    Port,
    Weight,
    Persistent,
    Password,
    Alias,
}

impl OptionName {
    /// All recognised options, in declaration order
    pub const ALL: [OptionName; 6] = [
        OptionName::Host,
        OptionName::Port,
        OptionName::Weight,
        OptionName::Persistent,
        OptionName::Password,
        OptionName::Alias,
    ];

    /// Lower-case key as accepted by [`OptionName::from_str`]
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionName::Host => "host",
            OptionName::Port => "port",
            OptionName::Weight => "weight",
            OptionName::Persistent => "persistent",
            OptionName::Password => "password",
            OptionName::Alias => "alias",
        }
    }
}

impl FromStr for OptionName {
    type Err = Error;

    /// Case-insensitive lookup; anything else is an unknown option
    fn from_str(s: &str) -> Result<Self> {
        OptionName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownOption(s.to_string()))
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loosely typed option value for the generic accessors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Bool(bool),
    /// Unset password or alias
    Null,
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<u16> for OptionValue {
    fn from(v: u16) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(OptionValue::Null, Into::into)
    }
}

/// Full configuration of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub host: String,
    pub port: u16,
    /// Consumed by whatever distributes keys across connections
    pub weight: u32,
    /// Keep the socket alive between commands (TCP keepalive)
    pub persistent: bool,
    /// Sent as `AUTH <password>` right after the socket opens, when non-empty
    pub password: Option<String>,
    /// Human-readable identity, see [`Options::identity`]
    pub alias: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            weight: DEFAULT_WEIGHT,
            persistent: false,
            password: None,
            alias: None,
        }
    }
}

impl Options {
    /// Build options from key/value pairs overlaid on the defaults
    ///
    /// Keys are matched case-insensitively. The first unknown key or
    /// ill-typed value aborts construction.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut options = Options::default();
        for (key, value) in pairs {
            options.set(key.as_ref(), value)?;
        }
        Ok(options)
    }

    /// Set one option by name
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<()> {
        let name: OptionName = name.parse()?;
        self.apply(name, value.into())
    }

    /// Read one option by name
    pub fn get(&self, name: &str) -> Result<OptionValue> {
        let name: OptionName = name.parse()?;
        Ok(self.value_of(name))
    }

    /// Typed read of one option
    pub fn value_of(&self, name: OptionName) -> OptionValue {
        match name {
            OptionName::Host => OptionValue::Str(self.host.clone()),
            OptionName::Port => OptionValue::Int(self.port as i64),
            OptionName::Weight => OptionValue::Int(self.weight as i64),
            OptionName::Persistent => OptionValue::Bool(self.persistent),
            OptionName::Password => self.password.clone().into(),
            OptionName::Alias => self.alias.clone().into(),
        }
    }

    /// Validate `value` for `name` and store it
    pub fn apply(&mut self, name: OptionName, value: OptionValue) -> Result<()> {
        match name {
            OptionName::Host => self.host = expect_string(name, value)?,
            OptionName::Port => {
                let port = expect_integer(name, value)?;
                self.port = u16::try_from(port).map_err(|_| invalid(name, "out of range 0-65535"))?;
            }
            OptionName::Weight => {
                let weight = expect_integer(name, value)?;
                self.weight = u32::try_from(weight).map_err(|_| invalid(name, "must be a non-negative integer"))?;
            }
            OptionName::Persistent => self.persistent = expect_bool(name, value)?,
            OptionName::Password => self.password = expect_optional_string(name, value)?,
            OptionName::Alias => self.alias = expect_optional_string(name, value)?,
        }
        Ok(())
    }

    /// The password, when one is configured and non-empty
    pub fn auth_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Alias when set and non-empty, otherwise `host:port`
    pub fn identity(&self) -> String {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

fn invalid(name: OptionName, reason: impl Into<String>) -> Error {
    Error::InvalidOption {
        name: name.as_str(),
        reason: reason.into(),
    }
}

fn expect_string(name: OptionName, value: OptionValue) -> Result<String> {
    match value {
        OptionValue::Str(s) => Ok(s),
        other => Err(invalid(name, format!("expected a string, got {:?}", other))),
    }
}

fn expect_optional_string(name: OptionName, value: OptionValue) -> Result<Option<String>> {
    match value {
        OptionValue::Null => Ok(None),
        other => expect_string(name, other).map(Some),
    }
}

fn expect_integer(name: OptionName, value: OptionValue) -> Result<i64> {
    match value {
        OptionValue::Int(i) => Ok(i),
        OptionValue::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(name, format!("'{}' is not an integer", s))),
        other => Err(invalid(name, format!("expected an integer, got {:?}", other))),
    }
}

fn expect_bool(name: OptionName, value: OptionValue) -> Result<bool> {
    match value {
        OptionValue::Bool(b) => Ok(b),
        OptionValue::Int(0) => Ok(false),
        OptionValue::Int(1) => Ok(true),
        OptionValue::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(invalid(name, format!("'{}' is not a boolean", s))),
        },
        other => Err(invalid(name, format!("expected a boolean, got {:?}", other))),
    }
}

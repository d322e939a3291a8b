//! Core value types describing a remote site
//!
//! This module contains the domain objects the codec and the store operate
//! on: the [`Site`] descriptor, its credential block, and the enumerations
//! that appear in the wire format with fixed integer or string tokens.
//!
//! Sites are plain values. They are copied out of and into document nodes
//! by the codec; nothing here holds a reference into a parsed tree.

use crate::protect::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Maximum length of a site display name, in characters
pub const MAX_NAME_LENGTH: usize = 255;

/// Largest accepted timezone offset, in minutes (one day in either direction)
pub const MAX_TIMEZONE_OFFSET: i32 = 60 * 24;

/// Transfer protocol used to reach a site
///
/// The integer values are the wire representation and must never be
/// reordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Plain FTP
    #[default]
    Ftp = 0,
    /// SSH file transfer protocol
    Sftp = 1,
    /// FTP over implicit TLS
    Ftps = 2,
    /// FTP over explicit TLS
    Ftpes = 3,
    /// FTP forced to stay unencrypted
    InsecureFtp = 4,
}

impl Protocol {
    /// Decode a wire integer, rejecting values outside the known range
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(Protocol::Ftp),
            1 => Some(Protocol::Sftp),
            2 => Some(Protocol::Ftps),
            3 => Some(Protocol::Ftpes),
            4 => Some(Protocol::InsecureFtp),
            _ => None,
        }
    }

    /// The wire integer for this protocol
    pub fn wire(self) -> i64 {
        self as i64
    }

    /// Whether sites using this protocol may carry post-login commands
    ///
    /// Only the FTP family executes raw commands after login; SFTP has no
    /// equivalent mechanism.
    pub fn supports_post_login_commands(self) -> bool {
        !matches!(self, Protocol::Sftp)
    }
}

/// Server type, controlling path and listing interpretation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    /// Autodetect from the server's responses
    #[default]
    Default = 0,
    /// Unix-style paths and listings
    Unix = 1,
    /// VMS paths
    Vms = 2,
    /// DOS/Windows paths with drive letters
    Dos = 3,
    /// MVS data sets
    Mvs = 4,
    /// Cygwin paths
    Cygwin = 5,
}

impl ServerType {
    /// Decode a wire integer, rejecting values outside the known range
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(ServerType::Default),
            1 => Some(ServerType::Unix),
            2 => Some(ServerType::Vms),
            3 => Some(ServerType::Dos),
            4 => Some(ServerType::Mvs),
            5 => Some(ServerType::Cygwin),
            _ => None,
        }
    }

    /// The wire integer for this server type
    pub fn wire(self) -> i64 {
        self as i64
    }
}

/// How credentials are acquired when connecting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogonType {
    /// No credentials; the classic `anonymous` login
    #[default]
    Anonymous = 0,
    /// Stored username and password
    Normal = 1,
    /// Ask for the password before connecting
    Ask = 2,
    /// Interactive keyboard authentication driven by the server
    Interactive = 3,
    /// Username, password and an additional account string
    Account = 4,
    /// Public-key authentication with a key file
    Key = 5,
}

impl LogonType {
    /// Decode a wire integer, rejecting values outside the known range
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(LogonType::Anonymous),
            1 => Some(LogonType::Normal),
            2 => Some(LogonType::Ask),
            3 => Some(LogonType::Interactive),
            4 => Some(LogonType::Account),
            5 => Some(LogonType::Key),
            _ => None,
        }
    }

    /// The wire integer for this logon type
    pub fn wire(self) -> i64 {
        self as i64
    }
}

/// FTP connection mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasvMode {
    /// Use the global default
    #[default]
    Default,
    /// Force passive mode
    Passive,
    /// Force active mode
    Active,
}

impl PasvMode {
    /// The wire token for this mode
    pub fn token(self) -> &'static str {
        match self {
            PasvMode::Default => "MODE_DEFAULT",
            PasvMode::Passive => "MODE_PASSIVE",
            PasvMode::Active => "MODE_ACTIVE",
        }
    }

    /// Decode a wire token; anything unrecognized maps to the default
    pub fn from_token(token: &str) -> Self {
        match token {
            "MODE_PASSIVE" => PasvMode::Passive,
            "MODE_ACTIVE" => PasvMode::Active,
            _ => PasvMode::Default,
        }
    }
}

/// Character encoding used for file names on the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharsetEncoding {
    /// Autodetect, preferring UTF-8 when the server announces it
    #[default]
    Auto,
    /// Force UTF-8
    Utf8,
    /// A named legacy encoding
    Custom(String),
}

/// A stored password, either recoverable plaintext or an encrypted blob
///
/// The variants are closed on purpose: adding a wire encoding means adding
/// a variant here and the compiler will point at every match that needs
/// updating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Password {
    /// Plaintext, base64-wrapped on the wire
    Plain(String),
    /// Ciphertext produced with the embedded public key
    Encrypted {
        /// Opaque ciphertext, stored verbatim
        ciphertext: String,
        /// Key the ciphertext was produced against
        pubkey: PublicKey,
    },
}

impl Password {
    /// Whether this password is stored in encrypted form
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Password::Encrypted { .. })
    }
}

/// Credential block of a site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// How credentials are acquired
    pub logon_type: LogonType,
    /// Username; empty for anonymous logins
    pub user: String,
    /// Stored password, absent for logon types that never persist one
    pub password: Option<Password>,
    /// Path to a private key file, for the `Key` logon type
    pub key_file: Option<PathBuf>,
    /// Additional account string, for the `Account` logon type
    pub account: String,
}

impl Credentials {
    /// Change the logon type, enforcing the field invariants
    ///
    /// The `Key` logon type never carries a password, and `Anonymous`
    /// carries no credential fields at all.
    pub fn set_logon_type(&mut self, logon_type: LogonType) {
        self.logon_type = logon_type;
        match logon_type {
            LogonType::Key => self.password = None,
            LogonType::Anonymous => {
                self.user.clear();
                self.password = None;
                self.key_file = None;
                self.account.clear();
            }
            _ => {}
        }
    }
}

/// A remote site descriptor: server address, options and credentials
///
/// # Examples
///
/// ```rust
/// use sitestore::{Site, Protocol, LogonType, Password};
///
/// let mut site = Site::new("ftp.example.com", 21);
/// site.set_name("Example mirror");
/// site.credentials.set_logon_type(LogonType::Normal);
/// site.credentials.user = "alice".to_string();
/// site.credentials.password = Some(Password::Plain("secret".to_string()));
/// assert_eq!(site.protocol, Protocol::Ftp);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Host name or address
    pub host: String,
    /// TCP port, 1-65535
    pub port: u16,
    /// Transfer protocol
    pub protocol: Protocol,
    /// Server type for path interpretation
    pub server_type: ServerType,
    /// Timezone offset of the server, in minutes
    pub timezone_offset: i32,
    /// FTP connection mode
    pub pasv_mode: PasvMode,
    /// File name encoding
    pub encoding: CharsetEncoding,
    /// Upper bound on simultaneous connections; 0 means no limit
    pub max_multiple_connections: u32,
    /// Raw commands sent after login, in order
    pub post_login_commands: Vec<String>,
    /// Skip the configured proxy for this site
    pub bypass_proxy: bool,
    /// Display name, at most [`MAX_NAME_LENGTH`] characters
    name: String,
    /// Arbitrary extra parameters keyed by name; last write wins
    pub extra_parameters: BTreeMap<String, String>,
    /// Credential block
    pub credentials: Credentials,
}

impl Site {
    /// Create a site for the given host and port with default options
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Site {
            host: host.into(),
            port,
            protocol: Protocol::default(),
            server_type: ServerType::default(),
            timezone_offset: 0,
            pasv_mode: PasvMode::default(),
            encoding: CharsetEncoding::default(),
            max_multiple_connections: 0,
            post_login_commands: Vec::new(),
            bypass_proxy: false,
            name: String::new(),
            extra_parameters: BTreeMap::new(),
            credentials: Credentials::default(),
        }
    }

    /// Display name of the site; empty if none was set
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the display name, trimming whitespace and truncating to
    /// [`MAX_NAME_LENGTH`] characters
    pub fn set_name(&mut self, name: &str) {
        self.name = name.trim().chars().take(MAX_NAME_LENGTH).collect();
    }

    /// Set an extra parameter, replacing any previous value under the key
    pub fn set_extra_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.extra_parameters.insert(name.into(), value.into());
    }
}

/// Whether a timezone offset in minutes is inside the accepted range
pub fn valid_timezone_offset(minutes: i32) -> bool {
    (-MAX_TIMEZONE_OFFSET..=MAX_TIMEZONE_OFFSET).contains(&minutes)
}

//! # sitestore - Durable XML-backed site configuration
//!
//! A persistence layer for remote-site connection profiles: load, validate,
//! repair and save an XML document describing FTP/SFTP sites, with the
//! durable-storage discipline a configuration file deserves.
//!
//! ## Overview
//!
//! sitestore provides three cooperating pieces:
//!
//! - A [`SiteStore`] that owns one configuration file and handles atomic
//!   replacement with a rolling backup, corruption detection and recovery,
//!   staleness tracking against external writers, and raw-byte snapshots
//!   for inter-process transfer
//! - A small owned XML tree ([`Document`]/[`Element`]) the rest of the
//!   application reads and mutates
//! - A [`codec`] mapping [`Site`] values to and from XML nodes, including
//!   the credential-encoding policy for plaintext, base64 and
//!   public-key-encrypted passwords
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sitestore::{codec, Element, LogonType, Password, Site, SiteStore};
//! use std::path::PathBuf;
//!
//! # fn main() -> sitestore::Result<()> {
//! // Load (or repair, or create) the configuration file
//! let mut store = SiteStore::new(PathBuf::from("sites.xml"));
//! store.load(false)?;
//!
//! // Describe a site and attach it under the root element
//! let mut site = Site::new("ftp.example.com", 21);
//! site.set_name("Example mirror");
//! site.credentials.set_logon_type(LogonType::Normal);
//! site.credentials.user = "alice".to_string();
//! site.credentials.password = Some(Password::Plain("secret".to_string()));
//!
//! let node = codec::encode(&site, Element::new("Server"));
//! store.root_mut().unwrap().add_child(node);
//!
//! // Persist: backup, write, fsync, commit
//! store.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Durability Guarantees
//!
//! Every destructive file operation is preceded by a backup and every
//! failure path restores the pre-operation state:
//!
//! - A save that fails mid-write deletes the partial file and puts the
//!   previous contents back, byte for byte
//! - A crash between backup and commit leaves a `<name>~` sibling that the
//!   next load transparently restores and deletes
//! - Configuration loss therefore requires storage-media failure, not just
//!   an ill-timed crash
//!
//! ## Concurrency Model
//!
//! The store is single-threaded and blocking; it performs no locking. A
//! concurrent external writer to the same path is detected opportunistically
//! via [`SiteStore::modified`], which callers should check before trusting
//! the in-memory tree. Access to one store instance must be serialized
//! externally if shared.
//!
//! ## Module Organization
//!
//! - [`store`]: file persistence engine with backup rotation
//! - [`document`]: owned XML tree and (de)serialization
//! - [`site`]: site descriptor and credential value types
//! - [`codec`]: Site ⇄ XML mapping
//! - [`protect`]: credential protection collaborators
//! - [`version`]: embedded version-string comparison
//! - [`error`]: error types and handling

// Public API modules
pub mod codec;
pub mod document;
pub mod error;
pub mod protect;
pub mod site;
pub mod store;
pub mod version;

// Internal modules (not part of public API)
mod utils;

// Re-export main types for convenience
pub use document::{Document, Element, Node};
pub use error::{Result, StoreError};
pub use protect::{CredentialProtector, PlaintextProtector, PublicKey};
pub use site::{
    CharsetEncoding, Credentials, LogonType, PasvMode, Password, Protocol, ServerType, Site,
    MAX_NAME_LENGTH,
};
pub use store::{SiteStore, DEFAULT_ROOT_NAME};
pub use version::VersionNumber;

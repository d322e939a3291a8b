//! Bidirectional mapping between [`Site`] values and XML nodes
//!
//! Decoding validates every field and refuses to produce a partially
//! initialized site; encoding writes fields in a fixed order so repeated
//! saves are byte-identical. The two directions are exact inverses for
//! every field except an empty display name, which decodes from the node's
//! own text content instead.
//!
//! ## Credential recovery policy
//!
//! Malformed credential material downgrades the logon type to
//! [`LogonType::Ask`] instead of failing the whole decode: an unrecognized
//! `Pass` encoding or an unparsable public key clears the password and
//! leaves the rest of the site intact, so the entry still surfaces in the
//! UI for manual repair. Structural problems (missing host, out-of-range
//! port or enumerants) are hard failures.

use crate::document::Element;
use crate::error::{Result, StoreError};
use crate::protect::{CredentialProtector, PlaintextProtector, PublicKey};
use crate::site::{
    valid_timezone_offset, CharsetEncoding, LogonType, PasvMode, Password, Protocol, ServerType,
    Site,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::PathBuf;
use tracing::warn;

/// Decode a site from its XML node
///
/// Fails with [`StoreError::Validation`] on a missing host, an
/// out-of-range port, unknown protocol/type/logon-type enumerants, an
/// invalid timezone offset, or a `Custom` encoding without a name. No
/// partial [`Site`] escapes a failed decode.
pub fn decode(node: &Element) -> Result<Site> {
    let host = node.child_text("Host");
    if host.is_empty() {
        return Err(StoreError::validation("missing host"));
    }

    let port = node.child_int("Port");
    if !(1..=65535).contains(&port) {
        return Err(StoreError::validation(format!("port {port} out of range")));
    }

    let protocol = Protocol::from_wire(node.child_int("Protocol"))
        .ok_or_else(|| StoreError::validation("unknown protocol"))?;
    let server_type = ServerType::from_wire(node.child_int("Type"))
        .ok_or_else(|| StoreError::validation("unknown server type"))?;
    let mut logon_type = LogonType::from_wire(node.child_int("Logontype"))
        .ok_or_else(|| StoreError::validation("unknown logon type"))?;

    let mut site = Site::new(host, port as u16);
    site.protocol = protocol;
    site.server_type = server_type;

    if logon_type != LogonType::Anonymous {
        let user = node.child_text("User");
        if user.is_empty()
            && logon_type != LogonType::Interactive
            && logon_type != LogonType::Ask
        {
            return Err(StoreError::validation("missing username"));
        }

        let mut password = None;
        if logon_type == LogonType::Normal || logon_type == LogonType::Account {
            if let Some(pass_element) = node.child("Pass") {
                match pass_element.attribute("encoding") {
                    None => password = Some(Password::Plain(pass_element.text())),
                    Some("base64") => {
                        // Undecodable material degrades to an empty
                        // password rather than failing the decode
                        let plain = BASE64
                            .decode(pass_element.text())
                            .ok()
                            .and_then(|raw| String::from_utf8(raw).ok())
                            .unwrap_or_default();
                        password = Some(Password::Plain(plain));
                    }
                    Some("crypt") => {
                        let pubkey = pass_element
                            .attribute("pubkey")
                            .map(PublicKey::from_base64);
                        match pubkey {
                            Some(Ok(pubkey)) => {
                                password = Some(Password::Encrypted {
                                    ciphertext: pass_element.text(),
                                    pubkey,
                                });
                            }
                            _ => {
                                // An encrypted blob without a usable key can
                                // never be decrypted again; ask instead
                                warn!("Discarding encrypted password with unusable public key");
                                logon_type = LogonType::Ask;
                            }
                        }
                    }
                    Some(other) => {
                        warn!("Unknown password encoding {:?}, asking on connect", other);
                        logon_type = LogonType::Ask;
                    }
                }
            }
        } else if logon_type == LogonType::Key {
            let key_file = node.child_text("Keyfile");
            if !key_file.is_empty() {
                site.credentials.key_file = Some(PathBuf::from(key_file));
            }
            // A key file and a stored password are mutually exclusive
            password = None;
        }

        site.credentials.user = user;
        site.credentials.password = password;
        site.credentials.account = node.child_text("Account");
    }
    site.credentials.logon_type = logon_type;

    let timezone_offset = i32::try_from(node.child_int("TimezoneOffset"))
        .ok()
        .filter(|minutes| valid_timezone_offset(*minutes))
        .ok_or_else(|| StoreError::validation("timezone offset out of range"))?;
    site.timezone_offset = timezone_offset;

    site.pasv_mode = PasvMode::from_token(&node.child_text("PasvMode"));
    site.max_multiple_connections = node.child_int("MaximumMultipleConnections").max(0) as u32;

    site.encoding = match node.child_text("EncodingType").as_str() {
        "UTF-8" => CharsetEncoding::Utf8,
        "Custom" => {
            let custom = node.child_text("CustomEncoding");
            if custom.is_empty() {
                return Err(StoreError::validation("custom encoding without a name"));
            }
            CharsetEncoding::Custom(custom)
        }
        _ => CharsetEncoding::Auto,
    };

    if site.protocol.supports_post_login_commands() {
        if let Some(commands) = node.child("PostLoginCommands") {
            for command in commands.children_named("Command") {
                let command = command.text();
                if !command.is_empty() {
                    site.post_login_commands.push(command);
                }
            }
        }
    }

    site.bypass_proxy = node.child_int("BypassProxy") == 1;

    if let Some(name) = node.child("Name") {
        site.set_name(&name.text());
    }
    if site.name().is_empty() {
        let fallback = node.trimmed_text();
        site.set_name(&fallback);
    }

    for parameter in node.children_named("Parameter") {
        let key = parameter.attribute("Name").unwrap_or_default();
        site.set_extra_parameter(key, parameter.text());
    }

    Ok(site)
}

/// Encode a site into the given container element
///
/// The container's existing children are cleared and the site's fields are
/// written in a fixed order. Credentials pass through `protector` first,
/// which may replace a plaintext password with its encrypted form. The
/// populated container is returned; attaching it to a document is the
/// caller's responsibility.
pub fn encode_with(
    site: &Site,
    mut node: Element,
    protector: &dyn CredentialProtector,
) -> Element {
    node.clear_children();

    node.add_text_element("Host", &site.host);
    node.add_text_element("Port", site.port.to_string());
    node.add_text_element("Protocol", site.protocol.wire().to_string());
    node.add_text_element("Type", site.server_type.wire().to_string());

    let mut credentials = site.credentials.clone();
    if credentials.logon_type != LogonType::Anonymous {
        node.add_text_element("User", &credentials.user);

        protector.protect(&mut credentials);

        if credentials.logon_type == LogonType::Normal
            || credentials.logon_type == LogonType::Account
        {
            match &credentials.password {
                Some(Password::Encrypted { ciphertext, pubkey }) => {
                    let pass = node.add_text_element("Pass", ciphertext.clone());
                    pass.set_attribute("encoding", "crypt");
                    pass.set_attribute("pubkey", pubkey.to_base64());
                }
                Some(Password::Plain(plain)) => {
                    let pass = node.add_text_element("Pass", BASE64.encode(plain.as_bytes()));
                    pass.set_attribute("encoding", "base64");
                }
                None => {}
            }

            if credentials.logon_type == LogonType::Account {
                node.add_text_element("Account", &credentials.account);
            }
        } else if let Some(key_file) = credentials.key_file.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            node.add_text_element("Keyfile", key_file.to_string_lossy());
        }
    }
    node.add_text_element("Logontype", credentials.logon_type.wire().to_string());

    node.add_text_element("TimezoneOffset", site.timezone_offset.to_string());
    node.add_text_element("PasvMode", site.pasv_mode.token());
    node.add_text_element(
        "MaximumMultipleConnections",
        site.max_multiple_connections.to_string(),
    );

    match &site.encoding {
        CharsetEncoding::Auto => {
            node.add_text_element("EncodingType", "Auto");
        }
        CharsetEncoding::Utf8 => {
            node.add_text_element("EncodingType", "UTF-8");
        }
        CharsetEncoding::Custom(custom) => {
            node.add_text_element("EncodingType", "Custom");
            node.add_text_element("CustomEncoding", custom.clone());
        }
    }

    if site.protocol.supports_post_login_commands() && !site.post_login_commands.is_empty() {
        let commands = node.add_child(Element::new("PostLoginCommands"));
        for command in &site.post_login_commands {
            commands.add_text_element("Command", command.clone());
        }
    }

    node.add_text_element("BypassProxy", if site.bypass_proxy { "1" } else { "0" });

    if !site.name().is_empty() {
        node.add_text_element("Name", site.name());
    }

    for (key, value) in &site.extra_parameters {
        let parameter = node.add_text_element("Parameter", value.clone());
        parameter.set_attribute("Name", key.clone());
    }

    node
}

/// Encode a site without a protecting transform
///
/// Equivalent to [`encode_with`] using the identity
/// [`PlaintextProtector`].
pub fn encode(site: &Site, node: Element) -> Element {
    encode_with(site, node, &PlaintextProtector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::site::Credentials;

    fn sample_site() -> Site {
        let mut site = Site::new("ftp.example.com", 21);
        site.set_name("Example");
        site.timezone_offset = 60;
        site.pasv_mode = PasvMode::Passive;
        site.max_multiple_connections = 2;
        site.post_login_commands = vec!["SITE UMASK 002".to_string()];
        site.bypass_proxy = true;
        site.set_extra_parameter("Color", "blue");
        site.credentials = Credentials {
            logon_type: LogonType::Normal,
            user: "alice".to_string(),
            password: Some(Password::Plain("hunter2".to_string())),
            key_file: None,
            account: String::new(),
        };
        site
    }

    fn decode_fragment(xml: &str) -> Result<Site> {
        let doc = Document::parse_str(xml).unwrap();
        decode(doc.root("Server").unwrap())
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let site = sample_site();
        let node = encode(&site, Element::new("Server"));
        let decoded = decode(&node).unwrap();
        assert_eq!(decoded, site);
    }

    #[test]
    fn test_plain_password_is_base64_on_the_wire() {
        let site = sample_site();
        let node = encode(&site, Element::new("Server"));
        let pass = node.child("Pass").unwrap();
        assert_eq!(pass.attribute("encoding"), Some("base64"));
        assert_eq!(pass.text(), BASE64.encode(b"hunter2"));
    }

    #[test]
    fn test_encrypted_password_round_trip() {
        let pubkey = PublicKey::new([1u8; 32], [2u8; 32]);
        let mut site = sample_site();
        site.credentials.password = Some(Password::Encrypted {
            ciphertext: "AAAABBBB".to_string(),
            pubkey,
        });

        let node = encode(&site, Element::new("Server"));
        let pass = node.child("Pass").unwrap();
        assert_eq!(pass.attribute("encoding"), Some("crypt"));
        assert_eq!(pass.attribute("pubkey"), Some(pubkey.to_base64().as_str()));

        let decoded = decode(&node).unwrap();
        assert_eq!(decoded, site);
    }

    #[test]
    fn test_unusable_pubkey_downgrades_to_ask() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>21</Port><Logontype>1</Logontype>
                <User>alice</User>
                <Pass encoding="crypt" pubkey="@@not-a-key@@">AAAA</Pass>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(site.credentials.logon_type, LogonType::Ask);
        assert_eq!(site.credentials.password, None);
        assert_eq!(site.credentials.user, "alice");
    }

    #[test]
    fn test_missing_pubkey_downgrades_to_ask() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>21</Port><Logontype>1</Logontype>
                <User>alice</User>
                <Pass encoding="crypt">AAAA</Pass>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(site.credentials.logon_type, LogonType::Ask);
        assert_eq!(site.credentials.password, None);
    }

    #[test]
    fn test_unknown_encoding_downgrades_to_ask() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>21</Port><Logontype>1</Logontype>
                <User>alice</User>
                <Pass encoding="rot13">frperg</Pass>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(site.credentials.logon_type, LogonType::Ask);
        assert_eq!(site.credentials.password, None);
    }

    #[test]
    fn test_unencoded_password_read_verbatim() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>21</Port><Logontype>1</Logontype>
                <User>alice</User>
                <Pass>legacy</Pass>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(
            site.credentials.password,
            Some(Password::Plain("legacy".to_string()))
        );
    }

    #[test]
    fn test_key_logon_forces_password_empty() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>22</Port><Protocol>1</Protocol><Logontype>5</Logontype>
                <User>alice</User>
                <Keyfile>/home/alice/.ssh/id_ed25519</Keyfile>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(site.credentials.logon_type, LogonType::Key);
        assert_eq!(site.credentials.password, None);
        assert_eq!(
            site.credentials.key_file,
            Some(PathBuf::from("/home/alice/.ssh/id_ed25519"))
        );
    }

    #[test]
    fn test_missing_host_fails() {
        assert!(decode_fragment("<Server><Port>21</Port></Server>").is_err());
    }

    #[test]
    fn test_port_validation() {
        for port in ["0", "65536", "-1", "not-a-number", ""] {
            let xml = format!("<Server><Host>h</Host><Port>{port}</Port></Server>");
            assert!(decode_fragment(&xml).is_err(), "port {port:?} accepted");
        }
    }

    #[test]
    fn test_out_of_range_enumerants_fail() {
        let base = "<Host>h</Host><Port>21</Port>";
        for extra in [
            "<Protocol>99</Protocol>",
            "<Type>99</Type>",
            "<Logontype>99</Logontype>",
            "<TimezoneOffset>100000</TimezoneOffset>",
        ] {
            let xml = format!("<Server>{base}{extra}</Server>");
            assert!(decode_fragment(&xml).is_err(), "{extra} accepted");
        }
    }

    #[test]
    fn test_missing_username_fails_for_normal() {
        assert!(decode_fragment(
            "<Server><Host>h</Host><Port>21</Port><Logontype>1</Logontype></Server>"
        )
        .is_err());
    }

    #[test]
    fn test_interactive_needs_no_username() {
        let site = decode_fragment(
            "<Server><Host>h</Host><Port>21</Port><Logontype>3</Logontype></Server>",
        )
        .unwrap();
        assert_eq!(site.credentials.logon_type, LogonType::Interactive);
    }

    #[test]
    fn test_post_login_commands_ignored_for_sftp() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>22</Port><Protocol>1</Protocol>
                <PostLoginCommands><Command>SITE UMASK</Command></PostLoginCommands>
            </Server>"#,
        )
        .unwrap();
        assert!(site.post_login_commands.is_empty());
    }

    #[test]
    fn test_empty_commands_skipped() {
        let site = decode_fragment(
            r#"<Server>
                <Host>h</Host><Port>21</Port>
                <PostLoginCommands><Command>one</Command><Command></Command><Command>two</Command></PostLoginCommands>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(site.post_login_commands, vec!["one", "two"]);
    }

    #[test]
    fn test_name_falls_back_to_node_text() {
        let site = decode_fragment(
            "<Server>  My Site  <Host>h</Host><Port>21</Port></Server>",
        )
        .unwrap();
        assert_eq!(site.name(), "My Site");
    }

    #[test]
    fn test_custom_encoding_requires_name() {
        assert!(decode_fragment(
            "<Server><Host>h</Host><Port>21</Port><EncodingType>Custom</EncodingType></Server>"
        )
        .is_err());

        let site = decode_fragment(
            r#"<Server><Host>h</Host><Port>21</Port>
                <EncodingType>Custom</EncodingType><CustomEncoding>latin1</CustomEncoding>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(site.encoding, CharsetEncoding::Custom("latin1".to_string()));
    }

    #[test]
    fn test_unknown_encoding_type_maps_to_auto() {
        let site = decode_fragment(
            "<Server><Host>h</Host><Port>21</Port><EncodingType>EBCDIC</EncodingType></Server>",
        )
        .unwrap();
        assert_eq!(site.encoding, CharsetEncoding::Auto);
    }

    #[test]
    fn test_duplicate_parameters_last_write_wins() {
        let site = decode_fragment(
            r#"<Server><Host>h</Host><Port>21</Port>
                <Parameter Name="Color">red</Parameter>
                <Parameter Name="Color">blue</Parameter>
            </Server>"#,
        )
        .unwrap();
        assert_eq!(
            site.extra_parameters.get("Color").map(String::as_str),
            Some("blue")
        );
    }

    #[test]
    fn test_protecting_transform_applied_on_encode() {
        struct StubProtector;
        impl CredentialProtector for StubProtector {
            fn protect(&self, credentials: &mut Credentials) {
                if let Some(Password::Plain(_)) = &credentials.password {
                    credentials.password = Some(Password::Encrypted {
                        ciphertext: "CIPHER".to_string(),
                        pubkey: PublicKey::new([3u8; 32], [4u8; 32]),
                    });
                }
            }
        }

        let site = sample_site();
        let node = encode_with(&site, Element::new("Server"), &StubProtector);
        let pass = node.child("Pass").unwrap();
        assert_eq!(pass.attribute("encoding"), Some("crypt"));
        assert_eq!(pass.text(), "CIPHER");
    }

    #[test]
    fn test_encode_clears_existing_children() {
        let mut node = Element::new("Server");
        node.add_text_element("Stale", "leftover");
        let node = encode(&sample_site(), node);
        assert!(node.child("Stale").is_none());
    }

    #[test]
    fn test_anonymous_writes_no_credentials() {
        let mut site = sample_site();
        site.credentials = Credentials::default();
        let node = encode(&site, Element::new("Server"));
        assert!(node.child("User").is_none());
        assert!(node.child("Pass").is_none());
        assert_eq!(node.child_text("Logontype"), "0");
    }
}

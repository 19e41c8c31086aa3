//! RTC access token, version `007`.
//!
//! Layout of the decoded content:
//!
//! ```text
//! bytes(signature)
//! string(app_id) u32(issue_ts) u32(expire) u32(salt) u16(service_count)
//! per service: u16(type) map(privilege -> expire) string(channel) string(uid)
//! ```
//!
//! The content is zlib-compressed, base64-encoded and prefixed with the
//! version string.

use super::packer::{Packer, Unpacker};
use super::SigningError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::Rng;
use ring::hmac;
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Token format version prefix.
pub const VERSION: &str = "007";

/// Required length of app ids and app certificates.
pub const APP_ID_LENGTH: usize = 32;

/// Service type tag of the RTC service.
pub const SERVICE_TYPE_RTC: u16 = 1;

/// Upper bound (inclusive) of the random salt.
const MAX_SALT: u32 = 99_999_999;

/// RTC service privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Privilege {
    /// Join the channel.
    JoinChannel = 1,
    /// Send audio.
    PublishAudioStream = 2,
    /// Send video.
    PublishVideoStream = 3,
    /// Send data streams.
    PublishDataStream = 4,
}

impl Privilege {
    /// Wire tag.
    #[must_use]
    pub const fn tag(self) -> u16 {
        self as u16
    }
}

/// RTC service section of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRtc {
    channel_name: String,
    uid: String,
    privileges: BTreeMap<u16, u32>,
}

impl ServiceRtc {
    /// RTC service for a numeric uid. Uid `0` is encoded as the empty
    /// string, which lets any uid join with the token.
    #[must_use]
    pub fn new(channel_name: impl Into<String>, uid: u32) -> Self {
        Self {
            channel_name: channel_name.into(),
            uid: if uid == 0 { String::new() } else { uid.to_string() },
            privileges: BTreeMap::new(),
        }
    }

    /// Grant `privilege` until `expire` seconds after issue.
    pub fn add_privilege(&mut self, privilege: Privilege, expire: u32) {
        self.privileges.insert(privilege.tag(), expire);
    }

    /// Expiry of a granted privilege.
    #[must_use]
    pub fn privilege(&self, privilege: Privilege) -> Option<u32> {
        self.privileges.get(&privilege.tag()).copied()
    }

    /// Channel the token is scoped to.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Encoded uid (`""` for uid 0).
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    fn pack(&self, packer: &mut Packer) -> Result<(), SigningError> {
        packer
            .put_u16(SERVICE_TYPE_RTC)
            .put_u32_map(&self.privileges)?
            .put_string(&self.channel_name)?
            .put_string(&self.uid)?;
        Ok(())
    }

    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, SigningError> {
        let privileges = unpacker.get_u32_map()?;
        let channel_name = unpacker.get_string()?;
        let uid = unpacker.get_string()?;
        Ok(Self {
            channel_name,
            uid,
            privileges,
        })
    }
}

/// Unsigned token body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    app_id: String,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    rtc: Option<ServiceRtc>,
}

impl AccessToken {
    /// New token issued at `issue_ts`, valid for `expire` seconds, with a
    /// random salt.
    #[must_use]
    pub fn new(app_id: impl Into<String>, issue_ts: u32, expire: u32) -> Self {
        let salt = rand::thread_rng().gen_range(1..=MAX_SALT);
        Self {
            app_id: app_id.into(),
            issue_ts,
            expire,
            salt,
            rtc: None,
        }
    }

    /// Override the salt.
    #[must_use]
    pub const fn with_salt(mut self, salt: u32) -> Self {
        self.salt = salt;
        self
    }

    /// Attach the RTC service, replacing any previous one.
    pub fn add_service(&mut self, service: ServiceRtc) {
        self.rtc = Some(service);
    }

    /// App id the token was issued for.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Unix time the token was issued at.
    #[must_use]
    pub const fn issue_ts(&self) -> u32 {
        self.issue_ts
    }

    /// Validity in seconds after `issue_ts`.
    #[must_use]
    pub const fn expire(&self) -> u32 {
        self.expire
    }

    /// Salt mixed into the signing key.
    #[must_use]
    pub const fn salt(&self) -> u32 {
        self.salt
    }

    /// RTC service, if attached.
    #[must_use]
    pub const fn rtc(&self) -> Option<&ServiceRtc> {
        self.rtc.as_ref()
    }

    /// Sign and encode the token.
    ///
    /// # Errors
    ///
    /// Fails when the app id or certificate is not 32 hex characters, no
    /// service is attached, or a field does not fit the packed format.
    pub fn build(&self, app_certificate: &str) -> Result<String, SigningError> {
        if !is_hex_id(&self.app_id) {
            return Err(SigningError::InvalidAppId);
        }
        if !is_hex_id(app_certificate) {
            return Err(SigningError::InvalidAppCertificate);
        }
        if self.rtc.is_none() {
            return Err(SigningError::NoService);
        }

        let signing_info = self.signing_info()?;
        let signature = self.signature(app_certificate, &signing_info);

        let mut content = Packer::new();
        content.put_bytes(signature.as_ref())?.put_raw(&signing_info);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&content.into_bytes())
            .map_err(|e| SigningError::Compression(e.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|e| SigningError::Compression(e.to_string()))?;

        Ok(format!("{VERSION}{}", STANDARD.encode(compressed)))
    }

    /// Decode a token string without checking its signature.
    ///
    /// # Errors
    ///
    /// Fails on a wrong version prefix, bad base64/zlib data, or a body
    /// that does not match the packed layout.
    pub fn parse(token: &str) -> Result<SignedAccessToken, SigningError> {
        let encoded = token
            .strip_prefix(VERSION)
            .ok_or_else(|| SigningError::UnsupportedVersion(token.chars().take(3).collect()))?;

        let compressed = STANDARD
            .decode(encoded)
            .map_err(|e| SigningError::Malformed(format!("base64: {e}")))?;

        let mut content = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut content)
            .map_err(|e| SigningError::Malformed(format!("zlib: {e}")))?;

        let mut unpacker = Unpacker::new(&content);
        let signature = unpacker.get_bytes()?.to_vec();
        let signing_info = unpacker.remaining().to_vec();

        let app_id = unpacker.get_string()?;
        let issue_ts = unpacker.get_u32()?;
        let expire = unpacker.get_u32()?;
        let salt = unpacker.get_u32()?;
        let service_count = unpacker.get_u16()?;

        let mut rtc = None;
        for _ in 0..service_count {
            match unpacker.get_u16()? {
                SERVICE_TYPE_RTC => rtc = Some(ServiceRtc::unpack(&mut unpacker)?),
                other => return Err(SigningError::UnsupportedService(other)),
            }
        }
        unpacker.finish()?;

        Ok(SignedAccessToken {
            token: Self {
                app_id,
                issue_ts,
                expire,
                salt,
                rtc,
            },
            signature,
            signing_info,
        })
    }

    fn signing_info(&self) -> Result<Vec<u8>, SigningError> {
        let mut packer = Packer::new();
        packer
            .put_string(&self.app_id)?
            .put_u32(self.issue_ts)
            .put_u32(self.expire)
            .put_u32(self.salt)
            .put_u16(u16::from(self.rtc.is_some()));
        if let Some(rtc) = &self.rtc {
            rtc.pack(&mut packer)?;
        }
        Ok(packer.into_bytes())
    }

    /// Two-step derived key: HMAC over the certificate keyed by the issue
    /// time, then HMAC over that keyed by the salt.
    fn signing_key(&self, app_certificate: &str) -> hmac::Key {
        let by_issue_ts = hmac::sign(
            &hmac::Key::new(hmac::HMAC_SHA256, &self.issue_ts.to_le_bytes()),
            app_certificate.as_bytes(),
        );
        let by_salt = hmac::sign(
            &hmac::Key::new(hmac::HMAC_SHA256, &self.salt.to_le_bytes()),
            by_issue_ts.as_ref(),
        );
        hmac::Key::new(hmac::HMAC_SHA256, by_salt.as_ref())
    }

    fn signature(&self, app_certificate: &str, signing_info: &[u8]) -> hmac::Tag {
        hmac::sign(&self.signing_key(app_certificate), signing_info)
    }
}

/// Token decoded from its string form together with its signature.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    token: AccessToken,
    signature: Vec<u8>,
    signing_info: Vec<u8>,
}

impl SignedAccessToken {
    /// Decoded body.
    #[must_use]
    pub const fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Check the signature against `app_certificate` in constant time.
    #[must_use]
    pub fn verify(&self, app_certificate: &str) -> bool {
        hmac::verify(
            &self.token.signing_key(app_certificate),
            &self.signing_info,
            &self.signature,
        )
        .is_ok()
    }
}

fn is_hex_id(value: &str) -> bool {
    value.len() == APP_ID_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_ID: &str = "970ca35de60c44645bbae8a215061b33";
    const APP_CERT: &str = "5cfd2fd1755d40ecb72977518be15d3b";

    fn sample_token() -> AccessToken {
        let mut service = ServiceRtc::new("7d72365eb983485397e3e3f9d460bdda", 2_882_341_273);
        service.add_privilege(Privilege::JoinChannel, 600);
        let mut token = AccessToken::new(APP_ID, 1_111_111, 900).with_salt(1);
        token.add_service(service);
        token
    }

    #[test]
    fn test_build_has_version_prefix() {
        let token = sample_token().build(APP_CERT).unwrap();
        assert!(token.starts_with(VERSION));
        assert!(token.len() > VERSION.len());
    }

    #[test]
    fn test_build_is_deterministic_for_fixed_salt() {
        let a = sample_token().build(APP_CERT).unwrap();
        let b = sample_token().build(APP_CERT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_recovers_fields_and_verifies() {
        let encoded = sample_token().build(APP_CERT).unwrap();
        let signed = AccessToken::parse(&encoded).unwrap();

        assert_eq!(signed.token(), &sample_token());
        let rtc = signed.token().rtc().unwrap();
        assert_eq!(rtc.uid(), "2882341273");
        assert_eq!(rtc.privilege(Privilege::JoinChannel), Some(600));
        assert_eq!(rtc.privilege(Privilege::PublishAudioStream), None);
        assert!(signed.verify(APP_CERT));
    }

    #[test]
    fn test_wrong_certificate_does_not_verify() {
        let encoded = sample_token().build(APP_CERT).unwrap();
        let signed = AccessToken::parse(&encoded).unwrap();
        assert!(!signed.verify("00000000000000000000000000000000"));
    }

    #[test]
    fn test_salt_changes_signature() {
        let a = sample_token().build(APP_CERT).unwrap();
        let b = sample_token().with_salt(2).build(APP_CERT).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_uid_zero_encodes_empty() {
        assert_eq!(ServiceRtc::new("room42", 0).uid(), "");
        assert_eq!(ServiceRtc::new("room42", 7).uid(), "7");
    }

    #[test]
    fn test_random_salt_in_range() {
        for _ in 0..100 {
            let salt = AccessToken::new(APP_ID, 0, 0).salt();
            assert!((1..=MAX_SALT).contains(&salt));
        }
    }

    #[test]
    fn test_build_rejects_bad_app_id() {
        let mut token = AccessToken::new("not-an-app-id", 0, 600);
        token.add_service(ServiceRtc::new("room", 0));
        assert_eq!(token.build(APP_CERT), Err(SigningError::InvalidAppId));
    }

    #[test]
    fn test_build_rejects_bad_certificate() {
        assert_eq!(
            sample_token().build("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(SigningError::InvalidAppCertificate)
        );
    }

    #[test]
    fn test_build_requires_service() {
        let token = AccessToken::new(APP_ID, 0, 600);
        assert_eq!(token.build(APP_CERT), Err(SigningError::NoService));
    }

    #[test]
    fn test_parse_rejects_other_versions() {
        assert!(matches!(
            AccessToken::parse("006abc"),
            Err(SigningError::UnsupportedVersion(v)) if v == "006"
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            AccessToken::parse("007!!!"),
            Err(SigningError::Malformed(_))
        ));
    }
}

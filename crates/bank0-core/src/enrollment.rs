//! The device enrollment record.
//!
//! An [`Enrollment`] binds this device and a user account to the credentials
//! issued by the identity service. It is produced once by the enrollment SDK
//! and afterwards only ever replaced wholesale, never edited in place.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Bank0Error, Bank0Result};

/// A single device enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    /// Opaque identifier issued by the authentication service.
    id: String,
    /// Human-readable account identifier.
    user_id: String,
    device_identifier: String,
    device_name: String,
    /// Push address of this device. Never interpreted locally.
    #[serde(alias = "deviceGCMToken")]
    notification_token: String,
    /// Token the service uses to authenticate the device. Never interpreted locally.
    device_token: String,
    /// Hash algorithm name for code generation (e.g. `"sha1"`).
    #[serde(default)]
    algorithm: Option<String>,
    /// Base-32 encoded shared secret.
    #[serde(default)]
    secret: Option<String>,
    /// Number of digits in a generated code.
    #[serde(default)]
    digits: Option<u32>,
    /// Time-step length in seconds.
    #[serde(default)]
    period: Option<u32>,
    /// Base-64 PKCS#8 DER private key used for request signing.
    #[serde(default, alias = "privateKey")]
    signing_key: Option<String>,
}

impl Enrollment {
    /// Create an enrollment with device identity only (no OTP parameters).
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        device_identifier: impl Into<String>,
        device_name: impl Into<String>,
        notification_token: impl Into<String>,
        device_token: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            device_identifier: device_identifier.into(),
            device_name: device_name.into(),
            notification_token: notification_token.into(),
            device_token: device_token.into(),
            algorithm: None,
            secret: None,
            digits: None,
            period: None,
            signing_key: None,
        }
    }

    /// Builder: attach TOTP parameters.
    pub fn with_totp(
        mut self,
        algorithm: impl Into<String>,
        secret: impl Into<String>,
        digits: u32,
        period: u32,
    ) -> Self {
        self.algorithm = Some(algorithm.into());
        self.secret = Some(secret.into());
        self.digits = Some(digits);
        self.period = Some(period);
        self
    }

    /// Builder: attach a base-64 encoded signing key as issued by the SDK.
    pub fn with_signing_key(mut self, encoded: impl Into<String>) -> Self {
        self.signing_key = Some(encoded.into());
        self
    }

    /// Builder: attach the signing key from raw PKCS#8 DER bytes.
    pub fn with_signing_key_der(mut self, der: &[u8]) -> Self {
        self.signing_key = Some(STANDARD.encode(der));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn device_identifier(&self) -> &str {
        &self.device_identifier
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn notification_token(&self) -> &str {
        &self.notification_token
    }

    pub fn device_token(&self) -> &str {
        &self.device_token
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// Base-32 encoded shared secret.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn digits(&self) -> Option<u32> {
        self.digits
    }

    /// Time-step length in seconds.
    pub fn period(&self) -> Option<u32> {
        self.period
    }

    /// `true` when all four OTP parameters are present.
    pub fn supports_totp(&self) -> bool {
        self.algorithm.is_some()
            && self.secret.is_some()
            && self.digits.is_some()
            && self.period.is_some()
    }

    /// `true` when at least one OTP parameter is present. Such an enrollment
    /// is meant to show codes, so any missing parameter is an error rather
    /// than a push-only enrollment.
    pub fn has_totp_parameters(&self) -> bool {
        self.algorithm.is_some()
            || self.secret.is_some()
            || self.digits.is_some()
            || self.period.is_some()
    }

    /// Decode the stored signing key into DER bytes.
    ///
    /// Line breaks and other whitespace are tolerated, since base-64 encoders
    /// on some platforms wrap their output.
    pub fn signing_key_der(&self) -> Bank0Result<Vec<u8>> {
        let encoded = self
            .signing_key
            .as_deref()
            .ok_or_else(|| Bank0Error::InvalidSigningKey("enrollment has no signing key".into()))?;
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| Bank0Error::InvalidSigningKey(e.to_string()))
    }

    /// Serialise to the JSON form kept in the preference store.
    pub fn to_json(&self) -> Bank0Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON form kept in the preference store.
    pub fn from_json(json: &str) -> Bank0Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Enrollment {
        Enrollment::new("dev_1", "alice@bank0", "device-abc", "Pixel", "fcm-token", "dtok")
            .with_totp("sha1", "JBSWY3DPEHPK3PXP", 6, 30)
    }

    #[test]
    fn json_uses_camel_case_field_names() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["userId"], "alice@bank0");
        assert_eq!(json["deviceIdentifier"], "device-abc");
        assert_eq!(json["notificationToken"], "fcm-token");
        assert_eq!(json["period"], 30);
    }

    #[test]
    fn reads_legacy_field_names() {
        let json = r#"{
            "id": "dev_1",
            "userId": "alice",
            "deviceIdentifier": "d",
            "deviceName": "n",
            "deviceGCMToken": "gcm",
            "deviceToken": "t",
            "privateKey": "AAEC\n"
        }"#;
        let e = Enrollment::from_json(json).unwrap();
        assert_eq!(e.notification_token(), "gcm");
        assert_eq!(e.signing_key_der().unwrap(), vec![0, 1, 2]);
        assert!(!e.supports_totp());
    }

    #[test]
    fn missing_otp_fields_deserialise_as_none() {
        let json = r#"{"id":"x","userId":"u","deviceIdentifier":"d","deviceName":"n",
                       "notificationToken":"p","deviceToken":"t","secret":null}"#;
        let e = Enrollment::from_json(json).unwrap();
        assert!(e.secret().is_none());
        assert!(e.algorithm().is_none());
        assert!(!e.supports_totp());
        assert!(!e.has_totp_parameters());
    }

    #[test]
    fn partial_otp_fields_still_count_as_code_enrollment() {
        let json = r#"{"id":"x","userId":"u","deviceIdentifier":"d","deviceName":"n",
                       "notificationToken":"p","deviceToken":"t","algorithm":"sha1",
                       "secret":"GEZDGNBV","digits":6}"#;
        let e = Enrollment::from_json(json).unwrap();
        assert_eq!(e.period(), None);
        assert_eq!(e.algorithm(), Some("sha1"));
        assert!(!e.supports_totp());
        assert!(e.has_totp_parameters());
    }

    #[test]
    fn signing_key_round_trip_through_base64() {
        let e = sample().with_signing_key_der(&[0x30, 0x82, 0x01]);
        assert_eq!(e.signing_key_der().unwrap(), vec![0x30, 0x82, 0x01]);
    }

    #[test]
    fn missing_signing_key_is_an_error() {
        assert!(matches!(
            sample().signing_key_der(),
            Err(Bank0Error::InvalidSigningKey(_))
        ));
    }

    #[test]
    fn garbage_signing_key_is_an_error() {
        let e = sample().with_signing_key("***");
        assert!(matches!(
            e.signing_key_der(),
            Err(Bank0Error::InvalidSigningKey(_))
        ));
    }
}

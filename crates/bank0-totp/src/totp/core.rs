//! Core OTP generation: RFC 4226 (HOTP) applied per RFC 6238 (TOTP).
//!
//! Turns an [`Enrollment`]'s algorithm, secret, digit count and period into a
//! validated [`TotpGenerator`], then derives codes for absolute Unix time in
//! milliseconds.

use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::totp::schedule;
use crate::totp::types::*;

const MAX_DIGITS: u32 = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an HOTP code for the given raw key bytes and counter.
pub fn hotp_raw(key: &[u8], counter: u64, digits: u32, algo: Algorithm) -> String {
    let hmac_result = compute_hmac(key, &counter.to_be_bytes(), algo);
    truncate(&hmac_result, digits)
}

fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Vec<u8> {
    match algo {
        Algorithm::Sha1 => mac_bytes::<Hmac<Sha1>>(key, data),
        Algorithm::Sha256 => mac_bytes::<Hmac<Sha256>>(key, data),
        Algorithm::Sha512 => mac_bytes::<Hmac<Sha512>>(key, data),
    }
}

fn mac_bytes<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        <M as hmac::digest::KeyInit>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(hmac_result: &[u8], digits: u32) -> String {
    let offset = (hmac_result[hmac_result.len() - 1] & 0x0f) as usize;
    let binary = ((hmac_result[offset] as u64 & 0x7f) << 24)
        | ((hmac_result[offset + 1] as u64) << 16)
        | ((hmac_result[offset + 2] as u64) << 8)
        | (hmac_result[offset + 3] as u64);
    let code = binary % 10u64.pow(digits);
    format!("{:0>width$}", code, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a base-32 secret (with or without spaces/dashes/padding, case-insensitive).
pub fn decode_secret(b32: &str) -> Bank0Result<Vec<u8>> {
    let cleaned = b32
        .replace([' ', '-'], "")
        .trim_end_matches('=')
        .to_uppercase();
    if cleaned.is_empty() {
        return Err(Bank0Error::InvalidSecret("secret is empty".into()));
    }
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &cleaned)
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| Bank0Error::InvalidSecret("not valid base-32".into()))
}

/// Encode raw bytes to base-32 (no padding, uppercase).
pub fn encode_secret(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generator bound to an enrollment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validated OTP parameters of one enrollment, with the secret decoded.
///
/// Building one is the only fallible step; generating codes afterwards
/// cannot fail.
#[derive(Clone)]
pub struct TotpGenerator {
    enrollment_id: String,
    key: Vec<u8>,
    algorithm: Algorithm,
    digits: u32,
    period: u32,
}

impl std::fmt::Debug for TotpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpGenerator")
            .field("enrollment_id", &self.enrollment_id)
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl TotpGenerator {
    /// Validate the enrollment's OTP fields and decode its secret.
    pub fn from_enrollment(enrollment: &Enrollment) -> Bank0Result<Self> {
        let (Some(algorithm), Some(secret), Some(digits), Some(period)) = (
            enrollment.algorithm(),
            enrollment.secret(),
            enrollment.digits(),
            enrollment.period(),
        ) else {
            return Err(Bank0Error::UnsupportedEnrollment(format!(
                "enrollment {} lacks algorithm, secret, digits or period",
                enrollment.id()
            )));
        };

        let algorithm = Algorithm::from_str_loose(algorithm).ok_or_else(|| {
            Bank0Error::UnsupportedEnrollment(format!("unknown algorithm '{}'", algorithm))
        })?;
        if digits == 0 || digits > MAX_DIGITS {
            return Err(Bank0Error::UnsupportedEnrollment(format!(
                "digit count {} outside 1..={}",
                digits, MAX_DIGITS
            )));
        }
        if period == 0 {
            return Err(Bank0Error::UnsupportedEnrollment("period must be positive".into()));
        }
        let key = decode_secret(secret)?;

        Ok(Self {
            enrollment_id: enrollment.id().to_string(),
            key,
            algorithm,
            digits,
            period,
        })
    }

    pub fn enrollment_id(&self) -> &str {
        &self.enrollment_id
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Time-step counter for an absolute Unix time in milliseconds.
    pub fn counter_at(&self, now_millis: u64) -> u64 {
        schedule::counter_at(now_millis, self.period)
    }

    /// Generate the code for the window containing `now_millis`.
    pub fn generate_at(&self, now_millis: u64) -> GeneratedCode {
        let counter = self.counter_at(now_millis);
        GeneratedCode {
            code: hotp_raw(&self.key, counter, self.digits, self.algorithm),
            counter,
            period: self.period,
            remaining_ms: schedule::remaining_in_window(now_millis, self.period),
            enrollment_id: self.enrollment_id.clone(),
        }
    }
}

/// Generate the code of `enrollment` for the window containing `now_millis`.
pub fn generate(enrollment: &Enrollment, now_millis: u64) -> Bank0Result<GeneratedCode> {
    Ok(TotpGenerator::from_enrollment(enrollment)?.generate_at(now_millis))
}

/// Format an OTP code with a space in the middle (e.g. "123 456").
pub fn format_code_display(code: &str) -> String {
    if code.len() <= 4 {
        return code.to_string();
    }
    let mid = code.len() / 2;
    format!("{} {}", &code[..mid], &code[mid..])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Secret "12345678901234567890" (ASCII), RFC 4226 Appendix D
    const RFC4226_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn enrollment(secret: &str, algorithm: &str, digits: u32, period: u32) -> Enrollment {
        Enrollment::new("dev_1", "alice", "device", "Pixel", "push", "token")
            .with_totp(algorithm, secret, digits, period)
    }

    /// Copy of `e` with one OTP field nulled out.
    pub(crate) fn without(e: &Enrollment, field: &str) -> Enrollment {
        let mut json = serde_json::to_value(e).unwrap();
        json[field] = serde_json::Value::Null;
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn rfc4226_hotp_vectors() {
        let key = decode_secret(RFC4226_SECRET).unwrap();
        let expected = [
            "755224", "287082", "359152", "969429", "338314",
            "254676", "287922", "162583", "399871", "520489",
        ];
        for (counter, exp) in expected.iter().enumerate() {
            let code = hotp_raw(&key, counter as u64, 6, Algorithm::Sha1);
            assert_eq!(&code, exp, "HOTP mismatch at counter {}", counter);
        }
    }

    // ── RFC 6238 vectors (times in milliseconds) ─────────────────

    #[test]
    fn rfc6238_sha1() {
        let e = enrollment(RFC4226_SECRET, "SHA1", 8, 30);
        assert_eq!(generate(&e, 59_000).unwrap().code, "94287082");
        assert_eq!(generate(&e, 1_111_111_109_000).unwrap().code, "07081804");
        assert_eq!(generate(&e, 20_000_000_000_000).unwrap().code, "65353130");
    }

    #[test]
    fn rfc6238_sha256() {
        let secret = encode_secret(b"12345678901234567890123456789012");
        let e = enrollment(&secret, "sha256", 8, 30);
        assert_eq!(generate(&e, 59_000).unwrap().code, "46119246");
    }

    #[test]
    fn rfc6238_sha512() {
        let secret =
            encode_secret(b"1234567890123456789012345678901234567890123456789012345678901234");
        let e = enrollment(&secret, "HmacSHA512", 8, 30);
        assert_eq!(generate(&e, 59_000).unwrap().code, "90693936");
    }

    // ── Window behaviour ─────────────────────────────────────────

    #[test]
    fn same_window_same_code_next_window_new_code() {
        let e = enrollment(RFC4226_SECRET, "SHA1", 6, 30);
        let at_zero = generate(&e, 0).unwrap();
        let at_end = generate(&e, 29_999).unwrap();
        let next = generate(&e, 30_000).unwrap();
        assert_eq!(at_zero.code, "755224");
        assert_eq!(at_zero.code, at_end.code);
        assert_eq!(at_zero.counter, 0);
        assert_eq!(next.code, "287082");
        assert_eq!(next.counter, 1);
    }

    #[test]
    fn code_depends_only_on_counter() {
        let e = enrollment(RFC4226_SECRET, "SHA1", 6, 30);
        for t in [90_000u64, 95_500, 119_999] {
            assert_eq!(generate(&e, t).unwrap().code, "969429");
        }
    }

    #[test]
    fn remaining_time_reported() {
        let e = enrollment(RFC4226_SECRET, "SHA1", 6, 30);
        let code = generate(&e, 59_000).unwrap();
        assert_eq!(code.remaining_ms, 1_000);
        assert_eq!(code.period, 30);
        assert_eq!(code.enrollment_id, "dev_1");
    }

    #[test]
    fn short_codes_are_zero_padded() {
        let e = enrollment(RFC4226_SECRET, "SHA1", 8, 30);
        // counter 37037036 yields 07081804 (leading zero)
        let code = generate(&e, 1_111_111_109_000).unwrap();
        assert_eq!(code.code.len(), 8);
        assert!(code.code.starts_with('0'));
    }

    // ── Failures ─────────────────────────────────────────────────

    #[test]
    fn missing_secret_is_unsupported() {
        let e = without(&enrollment(RFC4226_SECRET, "SHA1", 6, 30), "secret");
        assert!(matches!(generate(&e, 0), Err(Bank0Error::UnsupportedEnrollment(_))));
    }

    #[test]
    fn each_missing_field_is_unsupported() {
        let base = enrollment(RFC4226_SECRET, "SHA1", 6, 30);
        for field in ["algorithm", "digits", "period"] {
            let e = without(&base, field);
            assert!(matches!(
                TotpGenerator::from_enrollment(&e),
                Err(Bank0Error::UnsupportedEnrollment(_))
            ));
        }
    }

    #[test]
    fn unknown_algorithm_is_unsupported() {
        let e = enrollment(RFC4226_SECRET, "md5", 6, 30);
        assert!(matches!(generate(&e, 0), Err(Bank0Error::UnsupportedEnrollment(_))));
    }

    #[test]
    fn zero_period_and_bad_digits_are_unsupported() {
        assert!(matches!(
            generate(&enrollment(RFC4226_SECRET, "SHA1", 6, 0), 0),
            Err(Bank0Error::UnsupportedEnrollment(_))
        ));
        assert!(matches!(
            generate(&enrollment(RFC4226_SECRET, "SHA1", 0, 30), 0),
            Err(Bank0Error::UnsupportedEnrollment(_))
        ));
        assert!(matches!(
            generate(&enrollment(RFC4226_SECRET, "SHA1", 11, 30), 0),
            Err(Bank0Error::UnsupportedEnrollment(_))
        ));
    }

    #[test]
    fn undecodable_secret_is_invalid() {
        let e = enrollment("!!!INVALID!!!", "SHA1", 6, 30);
        assert!(matches!(generate(&e, 0), Err(Bank0Error::InvalidSecret(_))));
        let e = enrollment("", "SHA1", 6, 30);
        assert!(matches!(generate(&e, 0), Err(Bank0Error::InvalidSecret(_))));
    }

    // ── Secret helpers ───────────────────────────────────────────

    #[test]
    fn decode_tolerates_spacing_case_and_padding() {
        let clean = decode_secret("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(decode_secret("JBSW Y3DP EHPK 3PXP").unwrap(), clean);
        assert_eq!(decode_secret("jbsw-y3dp-ehpk-3pxp").unwrap(), clean);
        assert_eq!(decode_secret("MFRGG===").unwrap(), b"abc".to_vec());
    }

    #[test]
    fn generator_debug_hides_key() {
        let g = TotpGenerator::from_enrollment(&enrollment(RFC4226_SECRET, "SHA1", 6, 30)).unwrap();
        let dbg = format!("{:?}", g);
        assert!(dbg.contains("dev_1"));
        assert!(!dbg.contains("key"));
    }

    #[test]
    fn format_code_split() {
        assert_eq!(format_code_display("123456"), "123 456");
        assert_eq!(format_code_display("12345678"), "1234 5678");
        assert_eq!(format_code_display("1234"), "1234");
    }
}

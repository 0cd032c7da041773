use compact_str::{CompactString, format_compact};
use fast32::base32;
use rand::Rng;
use ring::hmac;

/// Number of random bytes in a generated shared secret, per RFC 6238
pub const RFC6238_SECRET_LENGTH: usize = 20;

/// Largest digit count still covered by the 31-bit truncated value
pub const MAX_DIGITS: u8 = 10;

/// Errors from the one-time-password engine
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// The textual secret is not valid base32
    #[error("secret is not valid base32: {0}")]
    InvalidSecretEncoding(#[from] fast32::DecodeError),

    /// The counter was negative
    #[error("counter must be non-negative, got {0}")]
    InvalidCounter(i64),

    /// The candidate code does not have the configured number of digits
    #[error("code is {actual} characters, expected {expected}")]
    CodeLengthMismatch {
        /// Configured digit count
        expected: usize,
        /// Length of the trimmed candidate
        actual: usize,
    },

    /// The digit count is outside `1..=10`
    #[error("{0} digits is outside the supported range of 1..=10")]
    UnsupportedDigits(u8),

    /// The period was zero
    #[error("period must be at least one second")]
    InvalidPeriod,
}

/// Keyed-hash families supported for code generation.
///
/// Closed set: an unsupported algorithm cannot be configured, so hash
/// computation itself cannot fail at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// HMAC-SHA-1, the RFC 4226 baseline
    Sha1,
    /// HMAC-SHA-256
    Sha256,
    /// HMAC-SHA-512
    Sha512,
}

impl Algorithm {
    fn hmac_algorithm(self) -> hmac::Algorithm {
        match self {
            Algorithm::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            Algorithm::Sha256 => hmac::HMAC_SHA256,
            Algorithm::Sha512 => hmac::HMAC_SHA512,
        }
    }

    /// Name used in `otpauth://` URIs
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared secret for code generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSecret(Box<[u8]>);

impl AsRef<[u8]> for SharedSecret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl SharedSecret {
    /// Create a shared secret from raw bytes
    pub fn new(secret: &[u8]) -> Self {
        Self(secret.into())
    }

    /// Create a fresh random secret of the RFC 6238 recommended length
    pub fn generate() -> Self {
        let mut secret = [0u8; RFC6238_SECRET_LENGTH];
        rand::rng().fill(&mut secret);
        Self(secret.into())
    }

    /// Decode a secret from its base32 textual form.
    ///
    /// Surrounding whitespace is stripped and the input is uppercased before
    /// decoding; canonical `=` padding is accepted.
    pub fn try_from_base32(secret: impl AsRef<str>) -> Result<Self, OtpError> {
        let cleaned = secret.as_ref().trim().to_uppercase();
        let cleaned = cleaned.trim_end_matches('=');
        let secret = base32::RFC4648_NOPAD.decode_str(cleaned)?.into_boxed_slice();
        Ok(Self(secret))
    }

    /// The base32 textual form of this secret
    pub fn to_base32(&self) -> String {
        base32::RFC4648_NOPAD.encode(&self.0)
    }
}

/// Compute the HOTP code for a counter.
///
/// HMAC over the big-endian counter, dynamically truncated per RFC 4226
/// §5.3, reduced modulo `10^digits` and left-padded with zeroes. Identical
/// inputs always yield identical output.
pub fn generate(
    secret: &SharedSecret,
    counter: i64,
    digits: u8,
    algorithm: Algorithm,
) -> Result<CompactString, OtpError> {
    if counter < 0 {
        return Err(OtpError::InvalidCounter(counter));
    }
    if digits == 0 || digits > MAX_DIGITS {
        return Err(OtpError::UnsupportedDigits(digits));
    }

    let key = hmac::Key::new(algorithm.hmac_algorithm(), secret.as_ref());
    #[allow(clippy::cast_sign_loss)]
    let message = (counter as u64).to_be_bytes();
    let digest = hmac::sign(&key, &message);
    let digest = digest.as_ref();

    // Dynamic truncation: the low nibble of the last byte picks which four
    // bytes become the 31-bit value.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let value = (u64::from(digest[offset] & 0x7f)) << 24
        | u64::from(digest[offset + 1]) << 16
        | u64::from(digest[offset + 2]) << 8
        | u64::from(digest[offset + 3]);
    let code = value % 10u64.pow(u32::from(digits));

    Ok(format_compact!("{code:0width$}", width = digits as usize))
}

use compact_str::CompactString;
use ring::constant_time;

use crate::hotp::{self, Algorithm, OtpError, SharedSecret};

/// The default period of a TOTP code in seconds
pub const RFC6238_TOTP_PERIOD: u64 = 30;

/// A TOTP line: the shared secret plus the parameters both ends agree on.
///
/// Digit count and period are validated once, here, so code generation and
/// verification cannot fail on configuration afterwards.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    secret: SharedSecret,
    period: u64,
    digits: u8,
    algorithm: Algorithm,
}

impl TotpConfig {
    /// Build a validated configuration.
    ///
    /// Rejects a zero period and digit counts outside `1..=10`, the range
    /// the 31-bit truncated value can fill.
    pub fn new(
        secret: SharedSecret,
        period: u64,
        digits: u8,
        algorithm: Algorithm,
    ) -> Result<Self, OtpError> {
        if period == 0 {
            return Err(OtpError::InvalidPeriod);
        }
        if digits == 0 || digits > hotp::MAX_DIGITS {
            return Err(OtpError::UnsupportedDigits(digits));
        }
        Ok(Self {
            secret,
            period,
            digits,
            algorithm,
        })
    }

    /// Configured digit count
    pub fn digits(&self) -> u8 {
        self.digits
    }

    /// Configured period in seconds
    pub fn period(&self) -> u64 {
        self.period
    }

    #[allow(clippy::cast_possible_wrap)]
    fn counter_at(&self, timestamp: i64) -> i64 {
        timestamp / self.period as i64
    }

    /// Generate the code for the period containing `timestamp` (UNIX seconds)
    pub fn generate_at(&self, timestamp: i64) -> Result<CompactString, OtpError> {
        hotp::generate(
            &self.secret,
            self.counter_at(timestamp),
            self.digits,
            self.algorithm,
        )
    }

    /// Verify a candidate code against the counters around `timestamp`.
    ///
    /// The candidate is trimmed of surrounding whitespace and must then be
    /// exactly `digits` characters. Counters are scanned in ascending order
    /// from `counter - window` to `counter + window`; each expected code is
    /// recomputed and compared in constant time. The first match wins; no
    /// match is `Ok(false)`, not an error.
    pub fn verify_at(
        &self,
        candidate: &str,
        timestamp: i64,
        window: u32,
    ) -> Result<bool, OtpError> {
        let candidate = candidate.trim();
        if candidate.len() != self.digits as usize {
            return Err(OtpError::CodeLengthMismatch {
                expected: self.digits as usize,
                actual: candidate.len(),
            });
        }

        let counter = self.counter_at(timestamp);
        for i in (counter - i64::from(window))..=(counter + i64::from(window)) {
            let expected = hotp::generate(&self.secret, i, self.digits, self.algorithm)?;
            if constant_time::verify_slices_are_equal(candidate.as_bytes(), expected.as_bytes())
                .is_ok()
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// `otpauth://` URI for enrolling this configuration in an OTP client
    pub fn provisioning_uri(&self, label: impl AsRef<str>, issuer: impl AsRef<str>) -> String {
        format!(
            "otpauth://totp/{}?secret={}&issuer={}&algorithm={}&digits={}&period={}",
            label.as_ref(),
            self.secret.to_base32(),
            issuer.as_ref(),
            self.algorithm,
            self.digits,
            self.period,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // base32 of "The quick brown fox jumps over the lazy dog."
    const PHRASE_SECRET: &str =
        "KRUGKIDROVUWG2ZAMJZG653OEBTG66BANJ2W24DTEBXXMZLSEB2GQZJANRQXU6JAMRXWOLQ=";

    // Counter 54324351; the codes for counters 54324350..=54324352 are
    // 841743, 934368 and 448556.
    const T: i64 = 1_629_730_530;

    fn config() -> TotpConfig {
        let secret = SharedSecret::try_from_base32(PHRASE_SECRET).unwrap();
        TotpConfig::new(secret, RFC6238_TOTP_PERIOD, 6, Algorithm::Sha512).unwrap()
    }

    #[test]
    fn generates_the_period_code() {
        assert_eq!(config().generate_at(T).unwrap(), "934368");
    }

    #[test]
    fn code_validates_within_clock_skew() {
        let totp = config();
        let code = totp.generate_at(T).unwrap();
        assert!(totp.verify_at(&code, T + 5, 1).unwrap());
        assert!(totp.verify_at(&code, T - 5, 1).unwrap());
        // One full period later the previous counter is still in the window.
        assert!(totp.verify_at(&code, T + 35, 1).unwrap());
    }

    #[test]
    fn code_outside_window_is_rejected_without_error() {
        let totp = config();
        let code = totp.generate_at(T).unwrap();
        assert!(!totp.verify_at(&code, T + 65, 1).unwrap());
        assert!(!totp.verify_at(&code, T - 65, 1).unwrap());
    }

    #[test]
    fn window_covers_adjacent_counters_only() {
        let totp = config();
        let next = totp.generate_at(T + 30).unwrap();
        assert!(totp.verify_at(&next, T, 1).unwrap());
        assert!(!totp.verify_at(&next, T, 0).unwrap());
    }

    #[test]
    fn candidate_is_trimmed_before_checking() {
        let totp = config();
        let code = totp.generate_at(T).unwrap();
        assert!(totp.verify_at(&format!("  {code}\n"), T, 1).unwrap());
    }

    #[test]
    fn wrong_length_is_an_error() {
        let result = config().verify_at("12345", T, 1);
        assert!(matches!(
            result,
            Err(OtpError::CodeLengthMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn wrong_code_of_right_length_is_a_mismatch() {
        // "000000" is none of the three codes in the window around T.
        assert!(!config().verify_at("000000", T, 1).unwrap());
    }

    #[test]
    fn engine_errors_abort_the_scan() {
        // Near the epoch the window reaches counter -1, which the engine
        // rejects rather than silently skipping.
        let result = config().verify_at("000000", 5, 1);
        assert!(matches!(result, Err(OtpError::InvalidCounter(-1))));
    }

    #[test]
    fn configuration_is_validated_up_front() {
        let secret = SharedSecret::try_from_base32(PHRASE_SECRET).unwrap();
        assert!(matches!(
            TotpConfig::new(secret.clone(), 0, 6, Algorithm::Sha512),
            Err(OtpError::InvalidPeriod)
        ));
        assert!(matches!(
            TotpConfig::new(secret, 30, 11, Algorithm::Sha512),
            Err(OtpError::UnsupportedDigits(11))
        ));
    }

    #[test]
    fn provisioning_uri_carries_the_parameters() {
        let uri = config().provisioning_uri("kaede", "otp-gate");
        assert!(uri.starts_with("otpauth://totp/kaede?secret="));
        assert!(uri.contains("issuer=otp-gate"));
        assert!(uri.contains("algorithm=SHA512"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }
}

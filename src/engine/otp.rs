//! One-time passcode issuance and validation

use crate::session::OtpChallenge;
use rand::Rng;
use tokio::time::Instant;

/// Outcome of checking caller input against the pending challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    /// Input is not a 6-digit code; no attempt is consumed
    NotSixDigits,
    /// Code matched within the validity window
    Valid,
    /// Wrong code, or no challenge outstanding
    Mismatch,
    /// Right or wrong, the issuance window has closed
    WindowClosed,
}

/// Generate a fresh 6-digit challenge
pub fn issue(now: Instant) -> OtpChallenge {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    OtpChallenge {
        code: code.to_string(),
        issued_at: now,
    }
}

/// Validate caller input. Window expiry is checked before the value so a
/// late correct code is still rejected.
pub fn check(challenge: Option<&OtpChallenge>, input: &str, now: Instant) -> OtpCheck {
    let input = input.trim();
    if input.len() != 6 || !input.bytes().all(|b| b.is_ascii_digit()) {
        return OtpCheck::NotSixDigits;
    }

    let Some(challenge) = challenge else {
        return OtpCheck::Mismatch;
    };

    if !challenge.is_within_window(now) {
        return OtpCheck::WindowClosed;
    }

    if challenge.code == input {
        OtpCheck::Valid
    } else {
        OtpCheck::Mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OTP_TTL;
    use std::time::Duration;

    fn challenge(code: &str, issued_at: Instant) -> OtpChallenge {
        OtpChallenge {
            code: code.to_string(),
            issued_at,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn issued_codes_are_six_digits() {
        for _ in 0..32 {
            let c = issue(Instant::now());
            assert_eq!(c.code.len(), 6);
            assert!(c.code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn correct_code_within_window_is_valid() {
        let now = Instant::now();
        let c = challenge("482193", now);
        assert_eq!(check(Some(&c), "482193", now), OtpCheck::Valid);
        assert_eq!(check(Some(&c), " 482193 ", now), OtpCheck::Valid);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_code_is_mismatch() {
        let now = Instant::now();
        let c = challenge("482193", now);
        assert_eq!(check(Some(&c), "123456", now), OtpCheck::Mismatch);
    }

    #[tokio::test(start_paused = true)]
    async fn late_correct_code_is_rejected() {
        let issued = Instant::now();
        let c = challenge("482193", issued);

        tokio::time::advance(OTP_TTL + Duration::from_secs(1)).await;
        assert_eq!(check(Some(&c), "482193", Instant::now()), OtpCheck::WindowClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn non_six_digit_input_consumes_nothing() {
        let now = Instant::now();
        let c = challenge("482193", now);
        assert_eq!(check(Some(&c), "12345", now), OtpCheck::NotSixDigits);
        assert_eq!(check(Some(&c), "1234567", now), OtpCheck::NotSixDigits);
        assert_eq!(check(Some(&c), "48219a", now), OtpCheck::NotSixDigits);
        assert_eq!(check(Some(&c), "please resend", now), OtpCheck::NotSixDigits);
    }

    #[tokio::test(start_paused = true)]
    async fn six_digits_without_challenge_is_mismatch() {
        assert_eq!(check(None, "482193", Instant::now()), OtpCheck::Mismatch);
    }
}

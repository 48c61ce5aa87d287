//! One-time registration credentials
//!
//! The device and the server share a seed. The credential for a time step is
//! the blake3 derived hash of the seed and the step counter, so it changes
//! every `step_seconds` and cannot be replayed in a later window.

use finsync_core::RegistrationCredentialSource;
use finsync_domain::constants::REGISTRATION_TIME_STEP_SECS;
use finsync_domain::{now_epoch_seconds, Result, SdkError};

const DERIVE_CONTEXT: &str = "finsync 2024 registration one-time credential";

/// Time-step credential derived from a shared seed.
pub struct TimeStepRegistrationCredential {
    seed: String,
    step_seconds: u64,
}

impl TimeStepRegistrationCredential {
    /// # Errors
    /// Returns `SdkError::Config` for an empty seed.
    pub fn new(seed: impl Into<String>) -> Result<Self> {
        let seed = seed.into();
        if seed.is_empty() {
            return Err(SdkError::Config("registration seed must not be empty".into()));
        }
        Ok(Self { seed, step_seconds: REGISTRATION_TIME_STEP_SECS })
    }

    #[must_use]
    pub fn with_step_seconds(mut self, step_seconds: u64) -> Self {
        self.step_seconds = step_seconds.max(1);
        self
    }

    /// Credential valid during the step containing `epoch_seconds`.
    #[must_use]
    pub fn credential_at(&self, epoch_seconds: i64) -> String {
        let step = u64::try_from(epoch_seconds).unwrap_or(0) / self.step_seconds;
        let mut hasher = blake3::Hasher::new_derive_key(DERIVE_CONTEXT);
        hasher.update(self.seed.as_bytes());
        hasher.update(&step.to_be_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }
}

impl RegistrationCredentialSource for TimeStepRegistrationCredential {
    fn one_time_credential(&self) -> Result<String> {
        Ok(self.credential_at(now_epoch_seconds()))
    }
}

//! Waitlist sign-up record and the submission flow of the landing page
//! form.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfessionalStatus {
    Professional,
    Student,
    Graduate,
    CareerChanger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Healthcare,
    Medical,
    Pharmaceutical,
    Other,
}

/// One waitlist sign-up as sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub email: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_status: Option<ProfessionalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<Sector>,
}

impl WaitlistEntry {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), WaitlistError> {
        if self.full_name.trim().is_empty() {
            return Err(WaitlistError::MissingName);
        }
        if !is_valid_email(self.email.trim()) {
            return Err(WaitlistError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitlistError {
    #[error("full name is required")]
    MissingName,
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("waitlist backend rejected the entry: {0}")]
    Backend(String),
}

/// Storage the form submits to. Failures are reported once; the form does
/// not retry.
#[allow(async_fn_in_trait)]
pub trait WaitlistBackend {
    async fn create(&self, entry: &WaitlistEntry) -> Result<(), WaitlistError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Success,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Success => "success",
        };
        f.write_str(label)
    }
}

/// Form draft plus submission state.
#[derive(Debug, Default)]
pub struct WaitlistForm {
    pub draft: WaitlistEntry,
    state: SubmissionState,
    last_error: Option<WaitlistError>,
}

impl WaitlistForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Error from the most recent failed submission, kept until the next
    /// attempt.
    pub fn last_error(&self) -> Option<&WaitlistError> {
        self.last_error.as_ref()
    }

    /// Validates the draft and moves to `Submitting`, returning the entry
    /// to send. Rejected while another submission is in flight.
    pub fn begin_submit(&mut self) -> Result<WaitlistEntry, WaitlistError> {
        if self.state == SubmissionState::Submitting {
            return Err(WaitlistError::AlreadySubmitting);
        }
        if let Err(err) = self.draft.validate() {
            self.state = SubmissionState::Idle;
            self.last_error = Some(err.clone());
            return Err(err);
        }
        self.state = SubmissionState::Submitting;
        self.last_error = None;
        Ok(self.draft.clone())
    }

    /// Applies the backend outcome of a submission started with
    /// [`WaitlistForm::begin_submit`].
    pub fn finish_submit(&mut self, outcome: Result<(), WaitlistError>) {
        if self.state != SubmissionState::Submitting {
            log::warn!("submission finished while {}", self.state);
        }
        match outcome {
            Ok(()) => {
                self.state = SubmissionState::Success;
                self.draft = WaitlistEntry::default();
            }
            Err(err) => {
                log::error!("waitlist submission failed: {err}");
                self.state = SubmissionState::Idle;
                self.last_error = Some(err);
            }
        }
    }

    pub async fn submit<B: WaitlistBackend>(&mut self, backend: &B) -> Result<(), WaitlistError> {
        let entry = self.begin_submit()?;
        let outcome = backend.create(&entry).await;
        self.finish_submit(outcome.clone());
        outcome
    }

    /// Returns from the success screen to an empty form.
    pub fn join_another(&mut self) {
        if self.state == SubmissionState::Success {
            self.state = SubmissionState::Idle;
        }
    }
}

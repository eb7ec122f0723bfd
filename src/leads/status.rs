use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ParseStatusError;
use crate::smtp_verify::Outcome;

/// Verification state stored on a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    /// Handed to a bulk vendor, result pending.
    Queued,
    VerifiedOk,
    VerifiedBad,
    VerifiedUnknown,
}

impl VerificationStatus {
    pub const ALL: [Self; 5] = [
        Self::Unverified,
        Self::Queued,
        Self::VerifiedOk,
        Self::VerifiedBad,
        Self::VerifiedUnknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Queued => "queued",
            Self::VerifiedOk => "verified_ok",
            Self::VerifiedBad => "verified_bad",
            Self::VerifiedUnknown => "verified_unknown",
        }
    }

    /// True once a verifier has produced an answer.
    pub fn is_checked(self) -> bool {
        matches!(
            self,
            Self::VerifiedOk | Self::VerifiedBad | Self::VerifiedUnknown
        )
    }
}

impl From<Outcome> for VerificationStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Affirmative => Self::VerifiedOk,
            Outcome::Negative => Self::VerifiedBad,
            Outcome::Indeterminate => Self::VerifiedUnknown,
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

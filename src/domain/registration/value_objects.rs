use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Registration Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Draft,
    Cancelled,
    Verified,
    WaitingList,
    NotAttended,
    Attended,
    Finished,
}

impl RegistrationStatus {
    pub fn can_transition_to(self, to: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        matches!(
            (self, to),
            (Draft, Verified | Cancelled | WaitingList | Attended | NotAttended)
                | (WaitingList, Draft | Cancelled)
                | (Verified, Cancelled | Attended | NotAttended)
                | (Attended | NotAttended, Finished)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Draft => "Draft",
            RegistrationStatus::Cancelled => "Cancelled",
            RegistrationStatus::Verified => "Verified",
            RegistrationStatus::WaitingList => "WaitingList",
            RegistrationStatus::NotAttended => "NotAttended",
            RegistrationStatus::Attended => "Attended",
            RegistrationStatus::Finished => "Finished",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationType {
    #[default]
    Participant,
    Student,
    Staff,
    Lecturer,
    Artist,
}

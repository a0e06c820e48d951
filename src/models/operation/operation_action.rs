//! The phases of a mining operation's endorsement pipeline.
//!
//! A set of allowed transitions is defined for each phase.  The happy path
//! runs from [OperationAction::Start] to [OperationAction::Done].  Every
//! non-terminal phase may also go straight to [OperationAction::Failed].

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, strum::Display,
)]
#[repr(u8)]
pub enum OperationAction {
    /// created, not yet picked up by the process manager.
    Start = 0,

    /// NodeCore returned the publication data to endorse.
    InstructionReceived = 1,

    /// endorsement transaction built and signed by the bitcoin wallet.
    EndorsementTransactionCreated = 2,

    /// endorsement transaction broadcast.  it sits in the bitcoin mempool
    /// until confirmed; these count against the mempool chain limit.
    Wait = 3,

    /// endorsement transaction mined into a bitcoin block.
    EndorsementTransactionConfirmed = 4,

    /// block-of-proof, merkle path and context blocks collected.
    ProofOfProofAssembled = 5,

    /// PoP transaction handed to NodeCore.
    SubmittedToNodeCore = 6,

    Done = 7,
    Failed = 8,
}

// Defines the allowed transitions between phases.
//
// Each sub-array is indexed by the integer value of the corresponding
// OperationAction variant and contains the phases allowed to follow it.
#[rustfmt::skip]
const OPERATION_TRANSITIONS: [&[OperationAction]; 9] = [

    // ----- start happy path -----

    // OperationAction::Start
    &[
        OperationAction::InstructionReceived,
        OperationAction::Failed,
    ],

    // OperationAction::InstructionReceived
    &[
        OperationAction::EndorsementTransactionCreated,
        OperationAction::Failed,
    ],

    // OperationAction::EndorsementTransactionCreated
    &[
        OperationAction::Wait,
        OperationAction::Failed,
    ],

    // OperationAction::Wait
    &[
        OperationAction::EndorsementTransactionConfirmed,
        OperationAction::Failed,
    ],

    // OperationAction::EndorsementTransactionConfirmed
    &[
        OperationAction::ProofOfProofAssembled,
        OperationAction::Failed,
    ],

    // OperationAction::ProofOfProofAssembled
    &[
        OperationAction::SubmittedToNodeCore,
        OperationAction::Failed,
    ],

    // OperationAction::SubmittedToNodeCore
    &[
        OperationAction::Done,
        OperationAction::Failed,
    ],

    // ---- end happy path ----

    // OperationAction::Done
    &[],

    // OperationAction::Failed
    &[],
];

impl OperationAction {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// true if `next` may directly follow `self`.
    pub fn can_transition_to(self, next: OperationAction) -> bool {
        OPERATION_TRANSITIONS[self as usize].contains(&next)
    }

    /// human readable description, as shown in operation listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::InstructionReceived => "Mining instruction received",
            Self::EndorsementTransactionCreated => "Endorsement transaction created",
            Self::Wait => "Waiting for endorsement transaction to confirm",
            Self::EndorsementTransactionConfirmed => "Endorsement transaction confirmed",
            Self::ProofOfProofAssembled => "Proof of proof assembled",
            Self::SubmittedToNodeCore => "Submitted to NodeCore",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[rustfmt::skip]
    const HAPPY_PATH: &[OperationAction] = &[
        OperationAction::Start,
        OperationAction::InstructionReceived,
        OperationAction::EndorsementTransactionCreated,
        OperationAction::Wait,
        OperationAction::EndorsementTransactionConfirmed,
        OperationAction::ProofOfProofAssembled,
        OperationAction::SubmittedToNodeCore,
        OperationAction::Done,
    ];

    #[test]
    fn happy_path_is_allowed() {
        for pair in HAPPY_PATH.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn every_non_terminal_phase_can_fail() {
        for action in OperationAction::iter().filter(|a| !a.is_terminal()) {
            assert!(action.can_transition_to(OperationAction::Failed));
        }
    }

    #[test]
    fn terminal_phases_have_no_successors() {
        for action in OperationAction::iter().filter(|a| a.is_terminal()) {
            assert!(OperationAction::iter().all(|next| !action.can_transition_to(next)));
        }
    }

    #[test]
    fn phases_cannot_be_skipped() {
        assert!(!OperationAction::Start.can_transition_to(OperationAction::Wait));
        assert!(!OperationAction::Wait.can_transition_to(OperationAction::Done));
    }
}

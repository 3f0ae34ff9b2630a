use std::fmt;

use transcript_markup::SafeMarkup;

use crate::sink::TranscriptSink;

/// Identifies one transcript entry across append, update, and finalize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHandle(pub u64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Agent,
    /// Side-channel notes: tool activity, errors, unrecognized events.
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

/// Why an agent message was finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FinalizeReason {
    /// The backend sent its final response marker.
    Completed,
    /// The transport closed before a final marker arrived.
    StreamEnded,
    /// The chunk source failed.
    TransportFailed,
}

/// Ordered command for the transcript sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderInstruction {
    Append {
        handle: MessageHandle,
        role: Role,
        content: SafeMarkup,
        provisional: bool,
    },
    Update {
        handle: MessageHandle,
        content: SafeMarkup,
        provisional: bool,
    },
    Finalize {
        handle: MessageHandle,
        reason: FinalizeReason,
    },
}

impl RenderInstruction {
    pub fn handle(&self) -> MessageHandle {
        match self {
            Self::Append { handle, .. } | Self::Update { handle, .. } | Self::Finalize { handle, .. } => {
                *handle
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalize { .. })
    }

    /// Dispatches this instruction to `sink`.
    pub fn apply<S: TranscriptSink + ?Sized>(&self, sink: &mut S) {
        match self {
            Self::Append {
                handle,
                role,
                content,
                provisional,
            } => sink.append(*handle, *role, content, *provisional),
            Self::Update {
                handle,
                content,
                provisional,
            } => sink.update(*handle, content, *provisional),
            Self::Finalize { handle, reason } => sink.finalize(*handle, *reason),
        }
    }
}

//! Transcript sink contract and an in-memory implementation.

use tracing::warn;
use transcript_markup::SafeMarkup;

use crate::instruction::{FinalizeReason, MessageHandle, Role};

/// Receives render instructions in order. Owned by the surrounding UI.
pub trait TranscriptSink {
    fn append(&mut self, handle: MessageHandle, role: Role, content: &SafeMarkup, provisional: bool);
    fn update(&mut self, handle: MessageHandle, content: &SafeMarkup, provisional: bool);
    fn finalize(&mut self, handle: MessageHandle, reason: FinalizeReason);
}

/// One rendered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub handle: MessageHandle,
    pub role: Role,
    pub content: SafeMarkup,
    /// Content may still change (a "thinking" or in-progress rendering).
    pub provisional: bool,
    pub finalized: Option<FinalizeReason>,
}

/// In-memory transcript that applies instructions to an ordered entry list.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn get(&self, handle: MessageHandle) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| e.handle == handle)
    }

    /// Most recent entry written by `role`.
    pub fn last_by(&self, role: Role) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|e| e.role == role)
    }

    fn get_mut(&mut self, handle: MessageHandle) -> Option<&mut TranscriptEntry> {
        self.entries.iter_mut().find(|e| e.handle == handle)
    }

    /// Renders the transcript as one `div` per entry.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let state = if entry.provisional { " provisional" } else { "" };
            out.push_str(&format!(
                "<div class=\"message {}-message{state}\">{}</div>\n",
                entry.role.as_str(),
                entry.content
            ));
        }
        out
    }
}

impl TranscriptSink for Transcript {
    fn append(&mut self, handle: MessageHandle, role: Role, content: &SafeMarkup, provisional: bool) {
        self.entries.push(TranscriptEntry {
            handle,
            role,
            content: content.clone(),
            provisional,
            finalized: None,
        });
    }

    fn update(&mut self, handle: MessageHandle, content: &SafeMarkup, provisional: bool) {
        match self.get_mut(handle) {
            Some(entry) if entry.finalized.is_none() => {
                entry.content = content.clone();
                entry.provisional = provisional;
            }
            Some(_) => warn!(%handle, "ignoring update to finalized message"),
            None => warn!(%handle, "ignoring update to unknown message"),
        }
    }

    fn finalize(&mut self, handle: MessageHandle, reason: FinalizeReason) {
        match self.get_mut(handle) {
            Some(entry) => {
                entry.provisional = false;
                entry.finalized = Some(reason);
            }
            None => warn!(%handle, "ignoring finalize of unknown message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::RenderInstruction;

    #[test]
    fn applies_append_update_finalize() {
        let mut transcript = Transcript::new();
        let handle = MessageHandle(1);
        let steps = [
            RenderInstruction::Append {
                handle,
                role: Role::Agent,
                content: SafeMarkup::from_plain_text("Thinking..."),
                provisional: true,
            },
            RenderInstruction::Update {
                handle,
                content: transcript_markup::render("Hi"),
                provisional: true,
            },
            RenderInstruction::Finalize {
                handle,
                reason: FinalizeReason::Completed,
            },
        ];
        for step in &steps {
            step.apply(&mut transcript);
        }
        let entry = transcript.get(handle).expect("entry");
        assert_eq!(entry.content.as_str(), "<p>Hi</p>");
        assert!(!entry.provisional);
        assert_eq!(entry.finalized, Some(FinalizeReason::Completed));
    }

    #[test]
    fn updates_after_finalize_are_ignored() {
        let mut transcript = Transcript::new();
        let handle = MessageHandle(3);
        transcript.append(handle, Role::Agent, &SafeMarkup::from_plain_text("a"), false);
        transcript.finalize(handle, FinalizeReason::StreamEnded);
        transcript.update(handle, &SafeMarkup::from_plain_text("b"), true);
        assert_eq!(transcript.get(handle).expect("entry").content.as_str(), "a");
    }

    #[test]
    fn html_marks_roles_and_provisional_entries() {
        let mut transcript = Transcript::new();
        transcript.append(MessageHandle(1), Role::User, &SafeMarkup::from_plain_text("<q>"), false);
        transcript.append(MessageHandle(2), Role::Agent, &SafeMarkup::from_plain_text("..."), true);
        assert_eq!(
            transcript.to_html(),
            "<div class=\"message user-message\">&lt;q&gt;</div>\n<div class=\"message agent-message provisional\">...</div>\n"
        );
    }
}

//! Turn lifecycle: classifies records, accumulates text, and decides what the
//! transcript should show.

use std::sync::Arc;

use tracing::{debug, warn};
use transcript_markup::{MarkupRenderer, SafeMarkup, StagedRenderer};

use crate::errors::StreamError;
use crate::event::{Event, classify_payload};
use crate::frame::Record;
use crate::instruction::{FinalizeReason, MessageHandle, RenderInstruction, Role};

/// Wording used for synthesized transcript content.
#[derive(Clone, Debug)]
pub struct InterpreterConfig {
    /// Provisional agent content shown until the first delta arrives.
    pub thinking_text: String,
    /// Content of a finalized response that produced no text.
    pub empty_response_text: String,
    /// Content of a response whose stream closed before the final marker.
    pub stream_ended_text: String,
    /// Longest raw payload or tool value quoted in a system note.
    pub max_note_chars: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            thinking_text: "Thinking...".to_string(),
            empty_response_text: "No response content found.".to_string(),
            stream_ended_text: "Response stream ended before completion.".to_string(),
            max_note_chars: 240,
        }
    }
}

impl InterpreterConfig {
    pub fn thinking_text(mut self, text: impl Into<String>) -> Self {
        self.thinking_text = text.into();
        self
    }

    pub fn empty_response_text(mut self, text: impl Into<String>) -> Self {
        self.empty_response_text = text.into();
        self
    }

    pub fn stream_ended_text(mut self, text: impl Into<String>) -> Self {
        self.stream_ended_text = text.into();
        self
    }

    pub fn max_note_chars(mut self, max: usize) -> Self {
        self.max_note_chars = max;
        self
    }
}

/// Lifecycle phase of one turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// Turn started; no response text or start marker yet.
    Idle,
    /// Response is streaming.
    Open,
    Finalized,
}

/// Per-turn state owned by the interpreter.
#[derive(Debug)]
pub struct ResponseState {
    turn_id: uuid::Uuid,
    handle: MessageHandle,
    phase: TurnPhase,
    accumulated_text: String,
    has_rendered_any: bool,
    seq: u64,
}

impl ResponseState {
    fn new(turn_id: uuid::Uuid, handle: MessageHandle) -> Self {
        Self {
            turn_id,
            handle,
            phase: TurnPhase::Idle,
            accumulated_text: String::new(),
            has_rendered_any: false,
            seq: 0,
        }
    }

    pub fn turn_id(&self) -> uuid::Uuid {
        self.turn_id
    }

    /// Handle of the agent message this turn renders into.
    pub fn handle(&self) -> MessageHandle {
        self.handle
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == TurnPhase::Open
    }

    /// Concatenation of every text delta applied so far, in order.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn has_rendered_any(&self) -> bool {
        self.has_rendered_any
    }

    /// Number of non-empty deltas applied.
    pub fn delta_count(&self) -> u64 {
        self.seq
    }
}

/// Classifier and accumulator for one conversation.
///
/// At most one turn is live at a time. Every turn ends with exactly one
/// [`RenderInstruction::Finalize`] unless it is abandoned.
pub struct EventInterpreter {
    renderer: Arc<dyn MarkupRenderer>,
    config: InterpreterConfig,
    next_handle: u64,
    turn: Option<ResponseState>,
}

impl Default for EventInterpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl EventInterpreter {
    /// Creates an interpreter using the staged markup renderer.
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_renderer(config, Arc::new(StagedRenderer))
    }

    /// Creates an interpreter with an injected renderer.
    pub fn with_renderer(config: InterpreterConfig, renderer: Arc<dyn MarkupRenderer>) -> Self {
        Self {
            renderer,
            config,
            next_handle: 0,
            turn: None,
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// State of the current (or most recently finalized) turn.
    pub fn state(&self) -> Option<&ResponseState> {
        self.turn.as_ref()
    }

    /// True when a turn has begun and not yet finalized.
    pub fn is_active(&self) -> bool {
        self.turn
            .as_ref()
            .is_some_and(|turn| turn.phase != TurnPhase::Finalized)
    }

    /// Classifies a record. Malformed payloads degrade to [`Event::Unknown`].
    pub fn interpret(&self, record: &Record) -> Event {
        match classify_payload(&record.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, payload_len = record.payload.len(), "degrading malformed record");
                Event::Unknown {
                    raw: record.payload.clone(),
                }
            }
        }
    }

    /// Appends the user's prompt as a finalized, escaped entry.
    pub fn user_message(&mut self, text: &str) -> RenderInstruction {
        RenderInstruction::Append {
            handle: self.allocate_handle(),
            role: Role::User,
            content: SafeMarkup::from_plain_text(text),
            provisional: false,
        }
    }

    /// Starts a new turn and appends its provisional agent message.
    pub fn begin_turn(&mut self) -> Result<RenderInstruction, StreamError> {
        if self.is_active() {
            return Err(StreamError::TurnInProgress);
        }
        let handle = self.allocate_handle();
        let turn_id = uuid::Uuid::new_v4();
        debug!(%turn_id, %handle, "turn started");
        self.turn = Some(ResponseState::new(turn_id, handle));
        Ok(RenderInstruction::Append {
            handle,
            role: Role::Agent,
            content: SafeMarkup::from_plain_text(&self.config.thinking_text),
            provisional: true,
        })
    }

    /// Applies one event and returns the instructions it produces, in order.
    pub fn on_event(&mut self, event: Event) -> Vec<RenderInstruction> {
        let Some(turn) = self.turn.as_ref() else {
            warn!(?event, "ignoring event outside of a turn");
            return Vec::new();
        };
        if turn.phase == TurnPhase::Finalized {
            debug!(turn_id = %turn.turn_id, ?event, "ignoring event after finalization");
            return Vec::new();
        }

        match event {
            Event::ResponseStart => {
                self.open();
                Vec::new()
            }
            Event::TextDelta { text, is_final } => {
                let mut out: Vec<RenderInstruction> = self.apply_delta(&text, !is_final).into_iter().collect();
                if is_final {
                    out.extend(self.finalize(FinalizeReason::Completed, None));
                }
                out
            }
            Event::ToolCall { name, input } => {
                let mut note = format!("Calling tool `{name}`");
                if let Some(input) = input {
                    note.push_str(&format!(" with `{}`", self.clip(&input.to_string())));
                }
                let content = self.renderer.render(&note);
                vec![self.note(content)]
            }
            Event::ToolResult { name, output } => {
                let mut note = format!("Tool `{name}` returned");
                if let Some(output) = output {
                    note.push_str(&format!(" `{}`", self.clip(&output.to_string())));
                }
                let content = self.renderer.render(&note);
                vec![self.note(content)]
            }
            Event::Error { message } => {
                warn!(turn_id = %turn.turn_id, %message, "agent reported an error");
                vec![self.note(SafeMarkup::from_plain_text(&format!("Error: {message}")))]
            }
            Event::Final { escalation } => {
                if turn.phase == TurnPhase::Idle {
                    let err = StreamError::ordering("final marker arrived before any response text");
                    debug!(turn_id = %turn.turn_id, error = %err, "finalizing early");
                }
                self.finalize(FinalizeReason::Completed, escalation)
            }
            Event::Unknown { raw } => {
                debug!(turn_id = %turn.turn_id, raw_len = raw.len(), "unrecognized event");
                let text = format!("Unrecognized event: {}", self.clip(&raw));
                vec![self.note(SafeMarkup::from_plain_text(&text))]
            }
        }
    }

    /// Handles transport completion. Synthesizes the terminal instruction
    /// when the turn never received its final marker.
    pub fn end_turn(&mut self) -> Vec<RenderInstruction> {
        if !self.is_active() {
            return Vec::new();
        }
        if let Some(turn) = &self.turn {
            warn!(turn_id = %turn.turn_id, deltas = turn.seq, "stream ended before the final response");
        }
        self.finalize(FinalizeReason::StreamEnded, None)
    }

    /// Reports a transport failure and finalizes the turn.
    pub fn fail_turn(&mut self, error: &StreamError) -> Vec<RenderInstruction> {
        if !self.is_active() {
            return Vec::new();
        }
        if let Some(turn) = &self.turn {
            warn!(turn_id = %turn.turn_id, error = %error, "transport failed mid-turn");
        }
        let mut out = vec![self.note(SafeMarkup::from_plain_text(&format!(
            "Error: {}",
            error.user_message()
        )))];
        out.extend(self.finalize(FinalizeReason::TransportFailed, None));
        out
    }

    /// Drops the current turn without producing any further instructions.
    pub fn abandon(&mut self) {
        if let Some(turn) = self.turn.take() {
            debug!(turn_id = %turn.turn_id, phase = ?turn.phase, "turn abandoned");
        }
    }

    fn allocate_handle(&mut self) -> MessageHandle {
        self.next_handle += 1;
        MessageHandle(self.next_handle)
    }

    fn open(&mut self) {
        if let Some(turn) = self.turn.as_mut()
            && turn.phase == TurnPhase::Idle
        {
            turn.phase = TurnPhase::Open;
        }
    }

    fn apply_delta(&mut self, text: &str, emit_update: bool) -> Option<RenderInstruction> {
        self.open();
        let turn = self.turn.as_mut()?;
        if text.is_empty() {
            return None;
        }
        turn.accumulated_text.push_str(text);
        turn.seq += 1;
        debug!(turn_id = %turn.turn_id, seq = turn.seq, delta_len = text.len(), "text delta");
        if !emit_update {
            return None;
        }
        turn.has_rendered_any = true;
        Some(RenderInstruction::Update {
            handle: turn.handle,
            content: self.renderer.render(&turn.accumulated_text),
            provisional: true,
        })
    }

    fn finalize(&mut self, reason: FinalizeReason, escalation: Option<String>) -> Vec<RenderInstruction> {
        let mut out = Vec::new();
        let has_text = self
            .turn
            .as_ref()
            .is_some_and(|turn| !turn.accumulated_text.is_empty());
        let escalation = escalation.map(|msg| format!("Agent escalated: {msg}"));
        if has_text && let Some(escalation) = &escalation {
            out.push(self.note(SafeMarkup::from_plain_text(escalation)));
        }

        let Some(turn) = self.turn.as_mut() else {
            return out;
        };
        let content = if has_text {
            self.renderer.render(&turn.accumulated_text)
        } else if let Some(escalation) = &escalation {
            SafeMarkup::from_plain_text(escalation)
        } else {
            match reason {
                FinalizeReason::StreamEnded => self.renderer.render(&self.config.stream_ended_text),
                FinalizeReason::Completed | FinalizeReason::TransportFailed => {
                    self.renderer.render(&self.config.empty_response_text)
                }
            }
        };
        turn.phase = TurnPhase::Finalized;
        turn.has_rendered_any = true;
        debug!(turn_id = %turn.turn_id, ?reason, deltas = turn.seq, "turn finalized");

        out.push(RenderInstruction::Update {
            handle: turn.handle,
            content,
            provisional: false,
        });
        out.push(RenderInstruction::Finalize {
            handle: turn.handle,
            reason,
        });
        out
    }

    fn note(&mut self, content: SafeMarkup) -> RenderInstruction {
        RenderInstruction::Append {
            handle: self.allocate_handle(),
            role: Role::System,
            content,
            provisional: false,
        }
    }

    fn clip(&self, text: &str) -> String {
        let max = self.config.max_note_chars;
        if text.chars().count() <= max {
            return text.to_string();
        }
        let mut clipped: String = text.chars().take(max).collect();
        clipped.push('…');
        clipped
    }
}

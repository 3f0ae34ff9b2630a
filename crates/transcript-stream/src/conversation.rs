//! Drives one turn at a time from a chunk source into a transcript sink.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::endpoint::AgentEndpoint;
use crate::errors::StreamError;
use crate::frame::{FrameParser, Record};
use crate::instruction::RenderInstruction;
use crate::interpreter::{EventInterpreter, InterpreterConfig};
use crate::sink::TranscriptSink;
use crate::source::ChunkSource;

/// Handle used to abandon the turn currently being streamed.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests abandonment of the running turn.
    ///
    /// Instructions already applied stay in the transcript; nothing further is
    /// emitted for the turn.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

/// How a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The backend sent its final response.
    Completed,
    /// The body closed before a final response arrived.
    StreamEnded,
    TransportFailed,
    /// Aborted through an [`AbortHandle`].
    Abandoned,
}

/// Owns the parser and interpreter for one conversation.
pub struct Conversation {
    parser: FrameParser,
    interpreter: EventInterpreter,
    abort_tx: watch::Sender<bool>,
    turns: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Conversation {
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_interpreter(EventInterpreter::new(config))
    }

    pub fn with_interpreter(interpreter: EventInterpreter) -> Self {
        let (abort_tx, _) = watch::channel(false);
        Self {
            parser: FrameParser::new(),
            interpreter,
            abort_tx,
            turns: 0,
        }
    }

    pub fn interpreter(&self) -> &EventInterpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut EventInterpreter {
        &mut self.interpreter
    }

    /// Returns a handle that can abandon the running turn.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: self.abort_tx.clone(),
        }
    }

    /// Renders one prompt/response turn read from `source`.
    ///
    /// Only misuse (`TurnInProgress`) is returned as an error; transport
    /// problems are rendered into the transcript and reported through the
    /// outcome.
    pub async fn run_turn<C, S>(
        &mut self,
        prompt: &str,
        source: &mut C,
        sink: &mut S,
    ) -> Result<TurnOutcome, StreamError>
    where
        C: ChunkSource + ?Sized,
        S: TranscriptSink + ?Sized,
    {
        self.start_turn(prompt, sink)?;
        Ok(self.pump(source, sink).await)
    }

    /// Sends `prompt` to `endpoint` and renders the streamed response.
    pub async fn ask<S>(
        &mut self,
        endpoint: &AgentEndpoint,
        prompt: &str,
        sink: &mut S,
    ) -> Result<TurnOutcome, StreamError>
    where
        S: TranscriptSink + ?Sized,
    {
        self.start_turn(prompt, sink)?;
        match endpoint.open_stream(prompt).await {
            Ok(mut source) => Ok(self.pump(&mut source, sink).await),
            Err(err) => {
                let instructions = self.interpreter.fail_turn(&err);
                apply_all(&instructions, sink);
                Ok(TurnOutcome::TransportFailed)
            }
        }
    }

    fn start_turn<S>(&mut self, prompt: &str, sink: &mut S) -> Result<(), StreamError>
    where
        S: TranscriptSink + ?Sized,
    {
        if self.interpreter.is_active() {
            return Err(StreamError::TurnInProgress);
        }
        self.parser.reset();
        self.abort_tx.send_replace(false);
        self.turns += 1;

        let user = self.interpreter.user_message(prompt);
        let agent = self.interpreter.begin_turn()?;
        apply_all(&[user, agent], sink);
        debug!(turn = self.turns, prompt_len = prompt.len(), "turn submitted");
        Ok(())
    }

    async fn pump<C, S>(&mut self, source: &mut C, sink: &mut S) -> TurnOutcome
    where
        C: ChunkSource + ?Sized,
        S: TranscriptSink + ?Sized,
    {
        let mut abort_rx = self.abort_tx.subscribe();
        loop {
            let next = tokio::select! {
                changed = abort_rx.changed() => {
                    match changed {
                        Ok(()) if *abort_rx.borrow() => {
                            self.parser.reset();
                            self.interpreter.abandon();
                            debug!(turn = self.turns, "turn abandoned by caller");
                            return TurnOutcome::Abandoned;
                        }
                        _ => continue,
                    }
                }
                next = source.next_chunk() => next,
            };

            match next {
                Ok(Some(chunk)) => {
                    let records: Vec<Record> = self.parser.feed(&chunk).collect();
                    for record in records {
                        let event = self.interpreter.interpret(&record);
                        debug!(turn = self.turns, event_name = ?record.event, ?event, "record");
                        let instructions = self.interpreter.on_event(event);
                        apply_all(&instructions, sink);
                    }
                }
                Ok(None) => {
                    if let Some(err) = self.parser.finish() {
                        warn!(turn = self.turns, error = %err, "discarding incomplete trailing record");
                    }
                    let instructions = self.interpreter.end_turn();
                    apply_all(&instructions, sink);
                    return if instructions.is_empty() {
                        TurnOutcome::Completed
                    } else {
                        TurnOutcome::StreamEnded
                    };
                }
                Err(err) => {
                    self.parser.reset();
                    let instructions = self.interpreter.fail_turn(&err);
                    apply_all(&instructions, sink);
                    return if instructions.is_empty() {
                        TurnOutcome::Completed
                    } else {
                        TurnOutcome::TransportFailed
                    };
                }
            }
        }
    }
}

fn apply_all<S>(instructions: &[RenderInstruction], sink: &mut S)
where
    S: TranscriptSink + ?Sized,
{
    for instruction in instructions {
        instruction.apply(sink);
    }
}

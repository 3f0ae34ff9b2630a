//! Common imports for driving a transcript.
pub use crate::{
    AbortHandle, AgentEndpoint, ChunkSource, Conversation, EndpointConfig, Event, EventInterpreter,
    FrameParser, InterpreterConfig, Record, RenderInstruction, StreamError, Transcript, TranscriptSink,
    TurnOutcome,
};
pub use transcript_markup::SafeMarkup;

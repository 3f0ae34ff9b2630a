//! Incremental rendering of streamed agent responses.
//!
//! Bytes from a [`ChunkSource`] are split into records by the [`FrameParser`],
//! classified and accumulated by the [`EventInterpreter`], and applied to a
//! [`TranscriptSink`] as ordered [`RenderInstruction`]s.
//!
//! # Replaying a captured stream
//!
//! ```
//! use transcript_stream::prelude::*;
//! use transcript_stream::source::StaticSource;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let body = concat!(
//!     "data: {\"event\":\"agent_response_start\"}\n\n",
//!     "data: {\"content\":{\"parts\":[{\"text\":\"Hello\"}]},\"is_final_response\":false}\n\n",
//!     "data: {\"content\":{\"parts\":[{\"text\":\", world\"}]},\"is_final_response\":true}\n\n",
//! );
//! let mut conversation = Conversation::default();
//! let mut transcript = Transcript::new();
//! let outcome = conversation
//!     .run_turn("Say hello", &mut StaticSource::new(body, 16), &mut transcript)
//!     .await?;
//!
//! assert_eq!(outcome, TurnOutcome::Completed);
//! assert!(transcript.to_html().contains("<p>Hello, world</p>"));
//! # Ok(())
//! # }
//! ```

/// Turn driver and cancellation handle.
pub mod conversation;
/// HTTP client for the agent backend.
pub mod endpoint;
pub mod errors;
/// Payload classification.
pub mod event;
/// Stream framing.
pub mod frame;
/// Render instructions and message identity.
pub mod instruction;
/// Turn state machine.
pub mod interpreter;
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Transcript sink contract and in-memory transcript.
pub mod sink;
/// Chunk source contract and adapters.
pub mod source;

pub use conversation::{AbortHandle, Conversation, TurnOutcome};
pub use endpoint::{AgentEndpoint, EndpointConfig, HttpChunkSource};
pub use errors::StreamError;
pub use event::{Event, classify_payload, classify_record};
pub use frame::{FrameParser, Record, Records};
pub use instruction::{FinalizeReason, MessageHandle, RenderInstruction, Role};
pub use interpreter::{EventInterpreter, InterpreterConfig, ResponseState, TurnPhase};
pub use observability::{LogSink, init_observability, verbosity_filter};
pub use sink::{Transcript, TranscriptEntry, TranscriptSink};
pub use source::{ByteStreamSource, ChunkSource, StaticSource};

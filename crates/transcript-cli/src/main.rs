//! Renders agent response streams to HTML from the command line.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use transcript_stream::prelude::*;
use transcript_stream::{Role, StaticSource, init_observability, verbosity_filter};

const DEFAULT_CHUNK_SIZE: usize = 64;
const REPLAY_PROMPT: &str = "(replayed stream)";

#[derive(Parser, Debug)]
#[command(name = "transcript")]
#[command(about = "Render streamed agent responses as safe HTML")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print only the agent's rendered markup instead of the full transcript
    #[arg(long, global = true)]
    fragments: bool,

    /// Raise log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Replay a captured `text/event-stream` body from a file
    Replay {
        file: PathBuf,

        /// Bytes delivered per chunk, to exercise record splitting
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Prompt shown as the user message
        #[arg(long, default_value = REPLAY_PROMPT)]
        prompt: String,
    },
    /// Send a prompt to the agent backend and render its streamed reply
    Ask {
        prompt: String,

        /// Override AGENT_BASE_URL
        #[arg(long)]
        base_url: Option<String>,

        /// Knowledge-base name appended to the stream path
        #[arg(long)]
        rag: Option<String>,
    },
    /// Render a lightweight-markup file without streaming
    Render { file: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_observability(verbosity_filter(cli.verbose));

    match cli.command {
        Commands::Replay {
            file,
            chunk_size,
            prompt,
        } => {
            let (outcome, transcript) = replay(&file, chunk_size, &prompt).await?;
            info!(?outcome, file = %file.display(), "replay finished");
            print!("{}", format_transcript(&transcript, cli.fragments));
        }
        Commands::Ask {
            prompt,
            base_url,
            rag,
        } => {
            let mut config = EndpointConfig::from_env()?;
            if let Some(base_url) = base_url {
                config = config.base_url(base_url);
            }
            if let Some(rag) = rag {
                config = config.rag_name(rag);
            }
            let endpoint = AgentEndpoint::new(config)?;
            let mut conversation = Conversation::default();
            let mut transcript = Transcript::new();
            let outcome = conversation
                .ask(&endpoint, &prompt, &mut transcript)
                .await?;
            info!(?outcome, "turn finished");
            print!("{}", format_transcript(&transcript, cli.fragments));
        }
        Commands::Render { file } => {
            let text = tokio::fs::read_to_string(&file).await?;
            println!("{}", transcript_markup::render(&text));
        }
    }
    Ok(())
}

async fn replay(
    file: &Path,
    chunk_size: usize,
    prompt: &str,
) -> Result<(TurnOutcome, Transcript), Box<dyn std::error::Error>> {
    let body = tokio::fs::read(file).await?;
    let mut source = StaticSource::new(body, chunk_size);
    let mut conversation = Conversation::default();
    let mut transcript = Transcript::new();
    let outcome = conversation
        .run_turn(prompt, &mut source, &mut transcript)
        .await?;
    Ok((outcome, transcript))
}

fn format_transcript(transcript: &Transcript, fragments: bool) -> String {
    if !fragments {
        return transcript.to_html();
    }
    transcript
        .entries()
        .iter()
        .filter(|entry| entry.role == Role::Agent)
        .map(|entry| format!("{}\n", entry.content))
        .collect()
}

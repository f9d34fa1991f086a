//! CLI module for Coco.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Coco - ingest audio and text, retrieve it, and ask agents about it
///
/// Drives the chunking, transcription and database services together with
/// an Ollama or OpenAI-compatible language model.
#[derive(Parser, Debug)]
#[command(name = "coco")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that every configured service is reachable
    Health {
        /// Stop at the first unreachable service
        #[arg(long)]
        strict: bool,
    },

    /// Print the JSON schemas of the tools offered to the agent
    Tools,

    /// Chunk, embed and store a text file
    Ingest {
        /// UTF-8 text file
        file: PathBuf,

        /// Language of the text
        #[arg(short, long, default_value = "")]
        language: String,

        /// Date of the source (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Transcribe an audio file and store the transcript
    Transcribe {
        /// Audio file
        audio: PathBuf,

        /// Prompt guiding the transcription
        #[arg(short, long)]
        prompt: Option<String>,

        /// Date of the recording (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Find the stored chunks closest to one or more queries
    Retrieve {
        /// Queries to search for
        #[arg(required = true)]
        queries: Vec<String>,

        /// Results per query
        #[arg(short, long, default_value = "5")]
        n_results: usize,

        /// Only documents dated on or after (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Only documents dated on or before (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Also generate an answer from the retrieved chunks
        #[arg(short, long)]
        answer: bool,
    },

    /// Run the tool-calling agent on one or more queries
    Agent {
        /// Queries, each answered in its own conversation
        #[arg(required = true)]
        queries: Vec<String>,

        /// Run queries one after another instead of in parallel batches
        #[arg(long)]
        sequential: bool,

        /// Print only the final answers
        #[arg(long)]
        answers_only: bool,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },
}

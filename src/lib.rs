//! Saum - Chunked Long-Form Transcription
//!
//! A CLI tool and library for transcribing audio/video of arbitrary length.
//!
//! The name "Saum" comes from the Norwegian word for "seam" — the overlapping
//! boundary where adjacent transcript chunks are stitched together.
//!
//! # Overview
//!
//! A single transcription call can only cover so much audio. Saum handles the
//! rest:
//!
//! - Plans overlapping chunk windows over the probed duration
//! - Splits the audio losslessly with ffmpeg
//! - Transcribes chunks concurrently through interchangeable backends
//!   (synchronous OpenAI adapters, or Deepgram with webhook delivery)
//! - Shifts chunk-local timestamps onto the global timeline
//! - Removes the duplicated words at each seam and stitches the transcript
//! - Optionally runs a re-chunked correction pass over the result
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `media` - ffmpeg/ffprobe probing, splitting, optimization, fetching
//! - `plan` - Chunk window planning
//! - `backend` - Transcription backend abstraction and the async job store
//! - `webhook` - Receiver for out-of-band backend deliveries
//! - `executor` - Concurrency-bounded chunk execution
//! - `timestamp` - Timestamp renormalization
//! - `stitch` - Seam deduplication and stitching
//! - `correction` - Windowed correction pass
//! - `pipeline` - Three-stage orchestration with scoped cleanup
//!
//! # Example
//!
//! ```rust,no_run
//! use saum::config::Settings;
//! use saum::pipeline::{MediaSource, Pipeline, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let config = RunConfig::from_settings(&settings);
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     let source = MediaSource::parse("lecture.mp3")?;
//!     let result = pipeline.run(source, config).await?;
//!     println!("{}", result.text);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod correction;
pub mod error;
pub mod executor;
pub mod keyterms;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod plan;
pub mod stitch;
pub mod timestamp;
pub mod transcript;
pub mod webhook;

pub use error::{Result, SaumError};

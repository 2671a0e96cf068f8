//! Configuration module for Saum.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    AdaptiveStep, ChunkingSettings, ConcurrencyMode, CorrectionSettings, DeepgramSettings,
    GeneralSettings, OptimizationSettings, Settings, StitchSettings, TranscriptionSettings,
    WebhookSettings,
};

//! # Emotion Analysis Common Library
//!
//! Shared code for the emotion analysis services:
//! - Modality and emotion result types (the analyzer wire contract)
//! - Real-time channel message types
//! - Health check response type
//! - Bootstrap configuration loading

pub mod config;
pub mod emotion;
pub mod error;
pub mod health;
pub mod realtime;

pub use emotion::{EmotionDistribution, Modality, ModalityMetadata, ModalityResult};
pub use error::{Error, Result};

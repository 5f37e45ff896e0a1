//! Deterministic readability scoring and sentence-frame generation for
//! scaffolded English-language-learner content.
//!
//! Both pieces are pure and side-effect free so they can be called directly
//! from node runners without touching an AI collaborator.

pub mod frames;
pub mod readability;

pub use frames::{generate_sentence_frames, SentenceFrame};
pub use readability::{analyze_readability, ReadabilityReport};

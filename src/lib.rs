pub mod core;
pub mod error;
pub mod fuzzy;
pub mod persistence;
pub mod report;

pub use crate::core::engine::{SpellCorrector, VERSION};
pub use crate::core::model::{LanguageModel, NGramModel};
pub use crate::core::types::ScoredCandidate;
pub use crate::error::{Result, SpellError};

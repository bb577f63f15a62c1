//! vizforge: LLM-driven chart recommendation for tabular datasets.
//!
//! A dataset is summarized, the summary drives goal generation, and each goal
//! is turned into chart code that an external executor renders. Stage
//! executors talk to a model through [`llm::TextGenerator`] and parse its
//! replies with [`parser`]; the [`manager::Manager`] sequences the stages and
//! feeds the [`retrieval::ContextStore`] used for chart analysis.

pub mod agents;
pub mod cli;
pub mod config;
pub mod data;
pub mod datamodel;
pub mod error;
pub mod executor;
pub mod llm;
pub mod manager;
pub mod parser;
pub mod prompts;
pub mod retrieval;
pub mod scaffold;

pub use config::VizConfig;
pub use error::{DataError, LlmError, VizError, VizResult};
pub use manager::{Manager, ManagerConfig, Session, SessionState};

pub mod json_prompt_store;
pub mod sample_prompts;
pub mod storage;

pub use crate::json_prompt_store::{JsonPromptStore, PromptSource};
pub use crate::storage::{AtomicJsonFile, ConfigStorage};

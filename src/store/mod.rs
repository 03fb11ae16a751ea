pub mod json;
pub mod prompts;
pub mod repo;

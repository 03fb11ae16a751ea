pub mod email;
pub mod prompt;

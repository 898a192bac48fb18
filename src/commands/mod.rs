pub mod assume;
pub mod completions;
pub mod status;

pub use assume::AssumeCommand;
pub use completions::CompletionsCommand;
pub use status::StatusCommand;

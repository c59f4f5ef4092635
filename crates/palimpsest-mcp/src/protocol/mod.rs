pub mod messages;
pub mod stdio;
pub mod types;

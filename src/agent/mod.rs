pub mod agent;
pub mod runner;

#[cfg(test)]
mod tests;

pub use agent::{InvocationContext, LlmAgent};
pub use runner::{EventStream, Runner};

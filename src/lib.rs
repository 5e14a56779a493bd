pub mod agent;
pub mod cli;
pub mod core;
pub mod probe;
pub mod providers;
pub mod storage;
pub mod tools;

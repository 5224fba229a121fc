// Library interface for newsagent modules
// This allows tests and other binaries to import modules

pub mod agent;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod storage;
pub mod tools;

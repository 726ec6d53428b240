// Library interface for newsbot modules
// This allows tests and other binaries to import modules

pub mod llm;
pub mod logstream;
pub mod news;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod storage;
pub mod twitter;

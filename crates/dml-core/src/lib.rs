pub mod config;
pub mod logging;

pub mod context;
pub mod control;
pub mod downloader;
pub mod job_store;
pub mod naming;
pub mod platform;
pub mod progress;
pub mod retry;
pub mod scanner;
pub mod scheduler;
pub mod storage;

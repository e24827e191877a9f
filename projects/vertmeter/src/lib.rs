pub mod app;
pub mod cli;
pub mod config;
pub mod export;
pub mod measure;
pub mod script;
pub mod session;
pub mod video;

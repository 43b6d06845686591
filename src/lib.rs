// Library surface for the binary and the headless integration tests.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod overlay;
pub mod runtime;
pub mod sampler;
pub mod session;
pub mod storage;
pub mod ui;
pub mod util;

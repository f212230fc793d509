pub mod article;
pub mod catalog;
pub mod config;
pub mod error;
pub mod generator;
pub mod http;
pub mod logging;
pub mod orchestrator;
pub mod prompts;
pub mod reviews;
pub mod state;
pub mod steam;
pub mod steamspy;

pub mod util {
    pub mod env;
}

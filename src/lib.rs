// Datachat - chat backend that summarizes uploaded files and streams file-aware completions

pub mod config;
pub mod files;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod routes;
pub mod store;
pub mod types;
pub mod utils;
pub mod visualization;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}

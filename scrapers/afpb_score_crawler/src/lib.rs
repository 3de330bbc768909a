pub mod club_names;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod game_extractor;
pub mod reconciler;
pub mod reference_api;
pub mod result_cache;
pub mod round_resolver;
pub mod scheduler;
pub mod types;
pub mod utils;

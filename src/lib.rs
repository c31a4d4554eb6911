pub mod catalog;
pub mod db;
pub mod gateway;
pub mod http;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod scrape;
pub mod security;
pub mod wizard;

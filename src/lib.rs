pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod models;
pub mod server;
pub mod services;

pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod services;
pub mod web;

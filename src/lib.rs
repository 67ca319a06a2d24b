pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod grid;
pub mod models;
pub mod persistence;
pub mod services;
pub mod state;

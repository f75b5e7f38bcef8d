pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod periods;
pub mod repositories;
pub mod scheduler;
pub mod services;

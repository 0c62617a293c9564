pub mod app_state;
pub mod articles;
pub mod auth;
pub mod config;
pub mod entities;
pub mod extractor;
pub mod feeds;
pub mod fetcher;
pub mod generator;
pub mod health;
pub mod jobs;
pub mod middleware;
pub mod passwords;
pub mod repositories;
pub mod sources;
pub mod telemetry;
pub mod web;

pub mod app;
pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod lobby;
pub mod routes;
pub mod store;

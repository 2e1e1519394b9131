pub mod auth;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod state;

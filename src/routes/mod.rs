pub mod account;
pub mod admin;
pub mod customer;
pub mod events;
pub mod provider;
pub mod public;

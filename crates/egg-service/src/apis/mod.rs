//! HTTP handlers for the egg price tracker API.

pub mod comparison;
pub mod health;
pub mod locations;
pub mod prices;

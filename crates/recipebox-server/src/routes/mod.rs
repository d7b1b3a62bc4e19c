//! Request handlers, grouped by resource.

pub mod catalog;
pub mod favorites;
pub mod health;
pub mod recipes;

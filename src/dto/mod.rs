//! Wire-level types: raw updates, classified events, button payloads and quiz
//! content documents.

pub mod event;
pub mod payload;
pub mod quiz;
pub mod update;
pub mod validation;

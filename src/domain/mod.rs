//! Domain layer - core tracking logic

pub mod alert;
pub mod price;

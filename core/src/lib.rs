pub mod error;
pub mod geo;
pub mod points;
pub mod stays;
pub mod validate;

pub mod health;
pub mod manifest;
pub mod rpc;
pub mod tools;

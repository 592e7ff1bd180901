pub mod axi;
pub mod bank;
pub mod engine;
pub mod sim;
pub mod traffic;

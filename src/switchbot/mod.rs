pub mod client;
pub mod sign;
pub mod types;

pub use client::{StatusResponse, SwitchBotClient};
pub use sign::{sign, sign_with, Signature};

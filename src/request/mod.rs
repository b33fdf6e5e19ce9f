// API request client: one immutable call descriptor per invocation, uniform envelope out.

pub mod client;
pub mod download;
pub mod error;
pub mod response;
pub mod session;

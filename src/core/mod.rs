pub mod chat_stream;
pub mod collaborators;
pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod ids;
pub mod message;
pub mod persistence;
pub mod service;
pub mod store;
pub mod stream;
#[cfg(test)]
pub(crate) mod test_support;

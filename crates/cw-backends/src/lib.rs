//! cw-backends: Chat endpoint implementations for the campaign chat widget
//!
//! This crate provides implementations of the ChatBackend trait.

pub mod http;

pub use http::HttpChatBackend;

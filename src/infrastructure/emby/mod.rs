pub mod client;

pub use client::{EmbyClient, EmbyClientConfig, EMBY_TOKEN_HEADER};

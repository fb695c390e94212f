// Network adapter for client sockets.

pub mod client;

pub use client::entry_handler;

#![doc = include_str!("../README.md")]

pub mod server;

pub use server::{
    config::{CliArgs, ServerConfig},
    router::serve_with_incoming,
};

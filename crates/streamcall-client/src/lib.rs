#![doc = include_str!("../README.md")]

pub mod client;

pub use client::{
    calculator::CalculatorCaller,
    config::{ClientArgs, ClientConfig},
    greet::GreetCaller,
    orchestrator::StreamResult,
};

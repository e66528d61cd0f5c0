pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod output;
pub mod presenter;
pub mod runner;
pub mod utils;

#[cfg(test)]
mod tests;

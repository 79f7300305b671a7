pub mod app;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod frameworks;
pub mod output;
pub mod reports;
pub mod session;
pub mod utils;

#[cfg(test)]
mod tests;

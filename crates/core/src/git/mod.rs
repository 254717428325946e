//! Git operations via `git2`.

pub mod client;

pub use client::GitClient;

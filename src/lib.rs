//! dexterm: a terminal catalog viewer for the PokéAPI.
//!
//! The [`query`] cache sits between the [`api`] client and the [`ui`] views;
//! [`app`] owns the terminal, the navigation stack and the event loop.

pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod query;
pub mod route;
pub mod ui;

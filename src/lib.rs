//! sqlbind library - SQL access for scripted load tests
//!
//! Exposes `open`, `exec`, `query` and `close` to a scripting host through a
//! driver registry, a value codec and per-context handle tracking. The
//! `sqlbind` binary drives the same module from the command line.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod module;
pub mod output;

#[macro_use]
pub mod test_macros;

#[cfg(test)]
pub mod test_utils;

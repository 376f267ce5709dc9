// Copyright 2026 Pitsync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pitsync library — weekly setup-package fetcher for TrackTitan.
//!
//! Drives a real browser through login, classifies the active setup
//! listings on the setups page, and lands each package archive under a
//! predictable `root/<car>/[team/]<track>/<package>` hierarchy. The
//! browser is an injected capability ([`browser::BrowserSession`]); all
//! core logic is testable against scripted fakes and captured snapshots.

pub mod auth;
pub mod browser;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod layout;
pub mod runner;
pub mod scrape;

//! CLI subcommand implementations for the `pitsync` binary.

pub mod doctor;
pub mod fetch_cmd;
pub mod teams_cmd;

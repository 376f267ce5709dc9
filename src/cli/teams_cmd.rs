//! `pitsync teams` — list Garage 61 team folders under the download root.

use crate::config::Config;
use crate::layout::scan_team_folders;
use anyhow::Result;
use std::path::PathBuf;

pub async fn run(root: Option<PathBuf>) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(root) = root {
        config.download_root = root;
    }

    let found = scan_team_folders(&config.download_root);
    if found.is_empty() {
        println!(
            "No team folders under {}.",
            config.download_root.display()
        );
        println!("Run `pitsync fetch --team <name>` to create one.");
    } else {
        println!("Team folders under {}:", config.download_root.display());
        for name in &found {
            println!("  {name}");
        }
    }
    Ok(())
}

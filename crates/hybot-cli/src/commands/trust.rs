//! `hybot trust`: mark a workspace as trusted.

use std::path::Path;

use anyhow::Result;
use hybot_config::{TrustStore, hybot_home};

use crate::session::trust_workspace;
use crate::theme::Theme;

/// Trust `workspace`, or list trusted workspaces with `list`.
pub(crate) fn run_trust(workspace: &Path, list: bool) -> Result<()> {
    let home = hybot_home(None)?;
    let mut store = TrustStore::load(&home)?;

    if list {
        if store.trusted().is_empty() {
            println!("{}", Theme::info("No trusted workspaces"));
            return Ok(());
        }
        println!("{}", Theme::header("Trusted workspaces"));
        for path in store.trusted() {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    if store.is_trusted(workspace) {
        println!(
            "{}",
            Theme::info(&format!("{} is already trusted", workspace.display()))
        );
    }
    trust_workspace(&mut store, workspace)?;
    println!(
        "  {}",
        Theme::dimmed(&format!("Recorded in {}", store.path().display()))
    );
    Ok(())
}

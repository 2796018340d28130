//! `hybot config`: inspect the resolved configuration.

use anyhow::Result;
use hybot_config::ResolvedConfig;

use crate::theme::Theme;

/// Print the merged configuration and the files it came from.
pub(crate) fn show_config(resolved: &ResolvedConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&resolved.config)?);
        return Ok(());
    }

    println!("{}", Theme::header("Configuration sources"));
    println!("  {}", Theme::dimmed("embedded defaults"));
    for path in &resolved.loaded_files {
        println!("  {}", path.display());
    }
    println!();
    print!("{}", resolved.to_yaml()?);
    Ok(())
}

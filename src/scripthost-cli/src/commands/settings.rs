//! Settings file dump

use anyhow::{Context, Result};
use scripthost::script::ScriptSettings;
use std::path::Path;

pub fn show(file: &Path, section: Option<&str>) -> Result<()> {
    let settings = ScriptSettings::load(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    print!("{}", render(&settings, section));
    Ok(())
}

fn render(settings: &ScriptSettings, only: Option<&str>) -> String {
    let mut out = String::new();
    for name in settings.sections() {
        if only.is_some_and(|s| !s.eq_ignore_ascii_case(name)) {
            continue;
        }
        if !name.is_empty() {
            out.push_str(&format!("[{}]\n", name));
        }
        for (key, value) in settings.entries(name) {
            out.push_str(&format!("  {:<20} = {}\n", key, value));
        }
    }
    out
}

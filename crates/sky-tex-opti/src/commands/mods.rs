use super::ModSourceArgs;
use crate::println_pad;
use colored::Colorize;
use miette::Result;

/// Print the resolved mod stack, highest priority first.
pub fn list_mods(args: ModSourceArgs) -> Result<()> {
    let mods = args.load_mods()?;

    println_pad!(
        "{} {}",
        "🧩 Mod stack:".bright_blue().bold(),
        format!("({} mods, highest priority first)", mods.len()).dimmed()
    );

    for (priority, m) in mods.iter().enumerate().rev() {
        let has_textures = m.root().join("textures").is_dir();
        let marker = if has_textures {
            "•".bright_cyan()
        } else {
            "◦".dimmed()
        };
        println_pad!(
            "   {} {} {} {}",
            marker,
            format!("{:>4}", priority).dimmed(),
            m.name().bright_cyan().bold(),
            m.root().as_str().dimmed()
        );
    }

    Ok(())
}

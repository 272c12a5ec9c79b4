//! System prompt assembly.

use chrono::{Local, NaiveDate};

/// Base prompt describing the host. The suffix from config is appended.
pub fn base_system_prompt(today: NaiveDate) -> String {
    format!(
        "<SYSTEM_CAPABILITY>\n\
         * You are utilising a Linux computer using {arch} architecture with internet access.\n\
         * Using the bash tool you can run programs and inspect files. GUI applications started \
         from bash may take some time to appear; take a screenshot to confirm.\n\
         * When a command is expected to print a large amount of text, redirect it into a \
         temporary file and search it with `grep -n -B <before> -A <after> <query> <file>`.\n\
         * Tool calls take a while to return. Where feasible, chain several actions into one \
         request.\n\
         * The current date is {date}.\n\
         </SYSTEM_CAPABILITY>",
        arch = std::env::consts::ARCH,
        date = today.format("%A, %B %-d, %Y"),
    )
}

/// The full system prompt: base plus `suffix`, joined by a single space.
pub fn system_prompt(suffix: &str) -> String {
    let base = base_system_prompt(Local::now().date_naive());
    let suffix = suffix.trim();
    if suffix.is_empty() {
        base
    } else {
        format!("{base} {suffix}")
    }
}

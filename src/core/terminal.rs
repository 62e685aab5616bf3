use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static CALENDAR: Emoji<'_, '_> = Emoji("📅 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_heading(title: &str) {
    println!("{} {}", CALENDAR, style(title).bold());
}

/// Renders a 20-cell progress bar, e.g. `[#####...............]  25%`.
pub fn progress_bar(progress: u8) -> String {
    let progress = progress.min(100) as usize;
    let filled = progress / 5;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(20 - filled),
        progress
    )
}

pub fn print_progress(progress: u8, message: &str) {
    println!("  {} {}", style(progress_bar(progress)).cyan(), message);
}

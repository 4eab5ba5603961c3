use colored::*;
use terminal_size::{Width, Height, terminal_size};

pub fn print_header(title: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let line = "─".repeat(width.0 as usize);
    println!("{}", line.black().bold());

    let name = "wilma-auth".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}  {}", name, version, title.cyan());

    println!("{}", line.black().bold());
}

/// Progress line
pub fn print_step(msg: &str) {
    println!("  {} {}", "›".cyan().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✔".green().bold(), msg.bold());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "!".yellow().bold(), msg.yellow());
}

/// Errors go to stderr
pub fn print_error(msg: &str) {
    eprintln!("  {} {}", "✘".red().bold(), msg.red());
}

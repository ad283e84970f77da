//! Leveled stderr logging. Human-facing chatter stays on stderr so
//! stdout carries only machine output (verified code, result JSON).

use chrono::Local;

#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

pub fn log(level: LogLevel, msg: impl Into<String>) {
    let icon = match level {
        LogLevel::Info => "·",
        LogLevel::Success => "✓",
        LogLevel::Warn => "⚠",
        LogLevel::Error => "✗",
    };
    eprintln!("[{}] {} {}", Local::now().format("%H:%M:%S"), icon, msg.into());
}

pub fn banner(msg: &str) {
    eprintln!();
    eprintln!("{}", "=".repeat(60));
    eprintln!("{msg}");
    eprintln!("{}", "=".repeat(60));
}

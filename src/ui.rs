//! Terminal presentation: prompts, progress rendering, and status styling.
//!
//! Status colors follow the semantic scheme of the original tool: green for
//! success, yellow for completed-with-warning, red for errors.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use console::style;
use indicatif::{ProgressBar as Bar, ProgressStyle as Style};
use inquire::{Confirm, Password, PasswordDisplayMode};

use crate::config::APP_NAME;
use crate::header::VolumeInfo;
use crate::progress::ProgressSink;
use crate::types::Mode;

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {percent}% {msg}";

/// Resolution of the progress bar in ticks.
const PROGRESS_SCALE: f32 = 10_000.0;

/// An indicatif-backed [`ProgressSink`].
pub struct TermProgress {
    bar: Bar,
}

impl TermProgress {
    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let bar = Bar::new(PROGRESS_SCALE as u64);
        bar.set_style(Style::with_template(PROGRESS_TEMPLATE).expect("valid progress template").progress_chars("●○ "));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for TermProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TermProgress {
    fn progress(&self, fraction: f32, _info: &str) {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        self.bar.set_position((fraction.clamp(0.0, 1.0) * PROGRESS_SCALE) as u64);
    }

    fn status(&self, message: &str) {
        self.bar.set_message(message.to_owned());
    }
}

/// Prompts for the password; encryption asks twice to catch typos.
///
/// # Errors
/// Fails when the prompt is interrupted or the password is empty.
pub fn prompt_password(mode: Mode) -> Result<String> {
    let prompt = Password::new("Password:").with_display_mode(PasswordDisplayMode::Masked);
    let prompt = match mode {
        Mode::Encrypt => prompt.with_custom_confirmation_message("Confirm password:"),
        Mode::Decrypt => prompt.without_confirmation(),
    };

    let password = prompt.prompt().context("password input failed")?;
    ensure!(!password.is_empty(), "password cannot be empty");
    Ok(password)
}

/// Asks whether an existing output may be overwritten.
///
/// # Errors
/// Fails when the prompt is interrupted.
pub fn confirm_overwrite(path: &Path) -> Result<bool> {
    Confirm::new(&format!("Output file {} already exists. Overwrite?", path.display()))
        .with_default(false)
        .prompt()
        .context("confirmation failed")
}

pub fn show_success(message: &str) {
    println!("{} {message}", style("✓").green().bold());
}

pub fn show_warning(message: &str) {
    println!("{} {message}", style("!").yellow().bold());
}

pub fn show_error(message: &str) {
    eprintln!("{} {message}", style("✗").red().bold());
}

/// Prints a volume's pre-password details: version, metadata, and the
/// options it was written with.
pub fn show_volume_info(info: &VolumeInfo) {
    println!("{} {}", style(format!("{APP_NAME} volume")).bold(), info.version);
    if !info.metadata.is_empty() {
        println!("{} {}", style("Metadata:").bold(), info.metadata);
    }

    let mut options = Vec::new();
    if info.flags.paranoid {
        options.push("paranoid mode");
    }
    if info.flags.reed_solomon {
        options.push("Reed-Solomon encoded");
    }
    if info.flags.keyfile {
        options.push(if info.flags.keyfile_order_matters { "keyfiles required (order matters)" } else { "keyfiles required" });
    }
    if !options.is_empty() {
        println!("{} {}", style("Options:").bold(), options.join(", "));
    }
}

/// Surfaces the keyfile requirement before the password prompt.
pub fn show_keyfile_hint(info: &VolumeInfo) {
    if info.flags.keyfile {
        let hint = if info.flags.keyfile_order_matters { "Keyfiles required; the correct order is required." } else { "Keyfiles required." };
        show_warning(hint);
    }
}

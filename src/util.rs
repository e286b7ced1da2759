use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use guess_host_triple::guess_host_triple;
use owo_colors::OwoColorize;
use termsize::Size;

use crate::containers::timed;
use crate::docker::ContainerRuntime;
use crate::filter::FilterMode;
use crate::AppState;

macro_rules! println_centered {
    ($width:expr, $text:expr) => {
        println!("{}", console::pad_str($text, $width as usize, console::Alignment::Center, None));
    };
}

/// Exits the process when the daemon doesn't answer a ping.
pub async fn ensure_runtime(runtime: &dyn ContainerRuntime, after: Duration) {
    if let Err(err) = timed("ping", after, runtime.ping()).await {
        println!(
            "The {} daemon can't be reached: {}. Is it running, and does {} point at it?",
            "docker".bold().blue(),
            err,
            "runtime.socket".bold()
        );

        process::exit(libc::EXIT_FAILURE);
    }
}

pub fn format_string_vec(arr: &[String]) -> String {
    match arr.len() {
        0 => String::new(),
        1 => arr[0].to_string(),
        2 => format!("{} and {}", arr[0], arr[1]),
        _ => {
            let mut result = arr[..arr.len() - 1].join(", ");
            result.push_str(&format!(", and {}", arr[arr.len() - 1]));
            result
        },
    }
}

/// One line describing the active filter, listing at most `shown` entries.
pub fn describe_filter(state: &AppState, shown: usize) -> String {
    let filter = state.filter.current();
    let by = match filter.mode() {
        FilterMode::Unfiltered => return String::from("none, showing every container"),
        FilterMode::ByName => "name",
        FilterMode::ById => "id",
    };

    let mut entries = filter.entries().take(shown).map(str::to_owned).collect::<Vec<_>>();
    if filter.len() > shown {
        entries.push(format!("{} more", filter.len() - shown));
    }

    format!("{} by {} ({})", filter.len(), by, format_string_vec(&entries))
}

pub fn print_intro(state: &AppState) -> Result<()> {
    let Size {
        cols, ..
    } = termsize::get().context("failed to get terminal width")?;

    println_centered!(
        cols,
        &format!("{} {}", "Dockhand".bold(), format!("v{}", built_info::PKG_VERSION).bright_blue())
    );
    println_centered!(cols, &format!("Listening on: {}", state.config.address()));
    println_centered!(cols, &format!("Filter: {}", describe_filter(state, 3)));

    if let Some(triple) = guess_host_triple() {
        println_centered!(cols, &format!("Running on: {}\n", triple));
    }

    Ok(())
}

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

//! Logs command feature.
//!
//! This module owns and handles the "maintkit logs" command behavior.

use std::fs;

use anyhow::anyhow;

use crate::cli::LogsAction;
use crate::config::Config;
use crate::log_sink::{ChannelId, LogSink};
use crate::theme::Theme;

pub(crate) fn handle_logs(config: &Config, action: LogsAction) -> anyhow::Result<()> {
    let sink = LogSink::new(config.log_dir());

    match action {
        LogsAction::Show { channel } => match sink.read(channel)? {
            Some(content) if !content.is_empty() => print!("{content}"),
            Some(_) => println!("{}", Theme::muted("(empty)")),
            None => println!(
                "{}",
                Theme::muted(&format!("{} has not been written yet", channel.file_name()))
            ),
        },
        LogsAction::Clear { channel: Some(channel) } => {
            sink.clear(channel)?;
            println!("{} Cleared {}", Theme::success("OK"), channel.file_name());
        }
        LogsAction::Clear { channel: None } => {
            let spinner = crate::progress::create_spinner("Clearing log channels...");
            let result = sink.clear_all();
            spinner.finish_and_clear();
            if let Err(errors) = result {
                for err in &errors {
                    eprintln!("{}", Theme::error(&err.to_string()));
                }
                return Err(anyhow!("{} log channel(s) could not be cleared", errors.len()));
            }
            println!("{} All logs cleared successfully.", Theme::success("OK"));
        }
        LogsAction::Path => print_paths(&sink),
    }
    Ok(())
}

fn print_paths(sink: &LogSink) {
    println!("{}", Theme::header(&sink.dir().display().to_string()));
    println!("{}", Theme::divider(60));
    for channel in ChannelId::ALL {
        let path = sink.path(channel);
        let size = fs::metadata(&path)
            .map(|m| bytesize::ByteSize(m.len()).to_string())
            .unwrap_or_else(|_| "-".to_string());
        println!("  {:<28} {:>10}  {}", channel.file_name(), size, channel.label());
    }
}

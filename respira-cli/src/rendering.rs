// src/rendering.rs
use anyhow::{Context, Result};
use colored::*;
use lazy_static::lazy_static;
use respira_core::{ChatMessage, Conversation};
use std::io::{self, Write};
use termimad::{MadSkin, crossterm::style::Color};

lazy_static! {
    static ref SKIN: MadSkin = create_skin();
}

fn create_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.bold.set_fg(Color::Yellow);
    skin.inline_code.set_fg(Color::Cyan);
    skin.inline_code.set_bg(Color::Reset);
    skin.code_block.set_fg(Color::Reset);
    skin.code_block.set_bg(Color::Reset);
    skin.table.set_fg(Color::Grey);
    skin
}

/// Renders the model's markdown answer on stdout.
pub fn print_formatted(markdown_text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    SKIN.write_text_on(&mut stdout, markdown_text)
        .context("Termimad rendering error")?;
    stdout.flush()?;
    Ok(())
}

/// One line block per message, tool calls and results included.
pub fn render_transcript(conversation: &Conversation) -> String {
    let mut out = String::new();
    for message in conversation.messages() {
        let label = match message {
            ChatMessage::System { .. } => "system".dimmed(),
            ChatMessage::User { .. } => "user".green().bold(),
            ChatMessage::Assistant { .. } => "assistant".cyan().bold(),
            ChatMessage::Tool { .. } => "tool".yellow(),
        };
        match message {
            ChatMessage::Tool { name, content, .. } => {
                out.push_str(&format!("[{}] {} -> {}\n", label, name, content));
            }
            ChatMessage::Assistant { tool_calls, .. } => {
                if !message.text().is_empty() {
                    out.push_str(&format!("[{}] {}\n", label, message.text()));
                }
                for call in tool_calls {
                    out.push_str(&format!("[{}] calls {}({})\n", label, call.name, call.arguments));
                }
            }
            other => out.push_str(&format!("[{}] {}\n", label, other.text())),
        }
    }
    out
}

pub fn print_transcript(conversation: &Conversation) {
    println!("\n{}", "--- Conversation ---".bold());
    print!("{}", render_transcript(conversation));
    println!("{}", "--------------------".bold());
}

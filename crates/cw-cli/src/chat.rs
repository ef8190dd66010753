//! Interactive chat mode with readline support.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config as EditorConfig, Editor};
use tracing::info;

use cw_core::analytics::SHARE_MODAL_OPENED;
use cw_core::engagement::TIME_POLL_INTERVAL;
use cw_core::{
    track_share, AnalyticsEvent, AnalyticsSink, ChatWidget, Outcome, Platform, Sender, ShareLinks, SystemClock,
    TimeOnPageTracker, TranscriptView,
};

use crate::config::Config;
use crate::signup::{run_form, TerminalSignup};

/// Extra wait after a follow-up's delay before printing it.
const FOLLOW_UP_GRACE: Duration = Duration::from_millis(50);

/// Chat commands
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand {
    Quit,
    Open,
    Close,
    Signup(Option<usize>),
    Transcript,
    Share(Option<String>),
    Help,
    None(String), // Regular message
}

fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return ChatCommand::None(trimmed.to_string());
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/open" => ChatCommand::Open,
        "/close" => ChatCommand::Close,
        "/signup" | "/yes" => ChatCommand::Signup(arg.and_then(|a| a.parse().ok())),
        "/transcript" | "/t" => ChatCommand::Transcript,
        "/share" => ChatCommand::Share(arg),
        "/help" | "/?" => ChatCommand::Help,
        _ => {
            eprintln!("Unknown command: {}. Type /help for available commands.", cmd);
            ChatCommand::None(String::new())
        }
    }
}

fn print_help() {
    println!(
        r#"
Chat Commands:
  /help, /?          Show this help message
  /open, /close      Show or hide the chat
  /signup [row]      Accept a signup offer (defaults to the latest one)
  /transcript, /t    Print the whole conversation
  /share [platform]  Show share links, or share on facebook/twitter/email
  /quit, /exit       Exit

Tips:
  - Press Ctrl+D to exit
  - Up/Down arrows navigate history
"#
    );
}

/// Print bot rows not shown yet, stopping at the first pending placeholder.
fn print_new_rows(view: &TranscriptView, shown: &mut usize) {
    for (i, row) in view.rows.iter().enumerate().skip(*shown) {
        if row.is_typing {
            break;
        }
        if row.sender == Sender::Bot {
            println!("bot> {}", row.text);
            if let Some(label) = row.action {
                println!("     [{label}]  /signup {i}");
            }
        }
        *shown = i + 1;
    }
}

fn print_transcript(view: &TranscriptView) {
    if view.rows.is_empty() {
        println!("(no messages yet)\n");
        return;
    }
    for (i, row) in view.rows.iter().enumerate() {
        println!("{:>3} {}> {}", i, row.sender, row.text);
    }
    println!();
}

fn latest_offer(view: &TranscriptView) -> Option<usize> {
    view.rows.iter().rposition(|r| r.action.is_some())
}

/// Show every share link and record that the share options were opened.
pub fn list_share_links(links: &ShareLinks, analytics: &dyn AnalyticsSink) {
    for p in Platform::all() {
        println!("  {:<9} {}", p, links.get(p));
    }
    analytics.emit(AnalyticsEvent::new(SHARE_MODAL_OPENED));
}

fn parse_platform(name: &str) -> Option<Platform> {
    Platform::all()
        .into_iter()
        .find(|p| p.as_str().eq_ignore_ascii_case(name))
}

/// Run interactive chat mode
pub async fn run_chat(
    config: &Config,
    widget: ChatWidget,
    signup: Arc<TerminalSignup>,
    analytics: Arc<dyn AnalyticsSink>,
) -> Result<()> {
    // Set up readline with history
    let editor_config = EditorConfig::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();

    let history_path = get_history_path();
    let mut rl: Editor<(), FileHistory> = Editor::with_config(editor_config)?;

    // Load history if available
    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    let time_tracker = TimeOnPageTracker::new(
        Arc::new(SystemClock::start()),
        Arc::clone(&analytics),
        config.page.as_str(),
    );
    let time_task = tokio::spawn(time_tracker.run(TIME_POLL_INTERVAL));

    widget.toggle_visibility();
    let mut shown = 0usize;
    info!(endpoint = %config.endpoint, page = %config.page, "chat session started");

    println!("Chat started. Ask Amy's team anything. Type /help for commands, /quit to exit.\n");

    loop {
        print_new_rows(&widget.render_transcript(), &mut shown);

        match rl.readline("you> ") {
            Ok(line) => {
                // Add to readline history
                let _ = rl.add_history_entry(&line);

                match parse_command(&line) {
                    ChatCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ChatCommand::Open => {
                        if widget.is_visible() {
                            println!("Chat is already open.\n");
                        } else {
                            widget.toggle_visibility();
                            println!("Chat opened.\n");
                        }
                    }
                    ChatCommand::Close => {
                        if widget.is_visible() {
                            widget.toggle_visibility();
                            println!("Chat closed. Type /open to come back.\n");
                        }
                    }
                    ChatCommand::Signup(row) => {
                        let view = widget.render_transcript();
                        let Some(row) = row.or_else(|| latest_offer(&view)) else {
                            println!("There is no signup offer to accept.\n");
                            continue;
                        };
                        if let Err(e) = widget.accept_signup_offer(row) {
                            eprintln!("{e}\n");
                            continue;
                        }
                        if signup.take_request() {
                            run_form(|prompt| read_field(&mut rl, prompt), analytics.as_ref(), &config.page)?;
                        }
                    }
                    ChatCommand::Transcript => {
                        print_transcript(&widget.render_transcript());
                    }
                    ChatCommand::Share(platform) => {
                        let links = ShareLinks::new(&config.page_url());
                        match platform.as_deref().map(parse_platform) {
                            None => {
                                list_share_links(&links, analytics.as_ref());
                                println!();
                            }
                            Some(Some(p)) => {
                                track_share(analytics.as_ref(), p, &config.page);
                                println!("{}\n", links.get(p));
                            }
                            Some(None) => {
                                eprintln!("Unknown platform. Use facebook, twitter or email.\n");
                            }
                        }
                    }
                    ChatCommand::Help => {
                        print_help();
                    }
                    ChatCommand::None(text) => {
                        if text.is_empty() {
                            continue;
                        }
                        if !widget.is_visible() {
                            println!("Chat is closed. Type /open to reopen it.\n");
                            continue;
                        }

                        let Some(exchange) = widget.submit(&text) else {
                            continue;
                        };
                        // The user row is already on screen as the prompt line.
                        shown = widget.render_transcript().rows.len() - 1;

                        print!("bot> ...");
                        io::stdout().flush()?;
                        let outcome = exchange.resolve().await;
                        print!("\r        \r");
                        io::stdout().flush()?;

                        print_new_rows(&widget.render_transcript(), &mut shown);
                        if outcome == (Outcome::Replied { follow_up_scheduled: true }) {
                            tokio::time::sleep(widget.config().follow_up_delay + FOLLOW_UP_GRACE).await;
                        }
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    time_task.abort();

    // Save history
    if let Some(path) = &history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

/// Ask one question on the shared editor. Ctrl+C and Ctrl+D cancel.
fn read_field(rl: &mut Editor<(), FileHistory>, prompt: &str) -> Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn get_history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cw").join("chat_history"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::testing::RecordingSink;
    use cw_core::Row;

    fn row(sender: Sender, text: &str) -> Row {
        Row {
            sender,
            text: text.to_string(),
            is_typing: false,
            action: None,
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/quit"), ChatCommand::Quit);
        assert_eq!(parse_command("/signup 4"), ChatCommand::Signup(Some(4)));
        assert_eq!(parse_command("/signup"), ChatCommand::Signup(None));
        assert_eq!(parse_command("/share twitter"), ChatCommand::Share(Some("twitter".to_string())));
        assert_eq!(parse_command("  hello  "), ChatCommand::None("hello".to_string()));
        assert_eq!(parse_command("/bogus"), ChatCommand::None(String::new()));
    }

    #[test]
    fn test_print_new_rows_stops_at_typing() {
        let mut view = TranscriptView {
            rows: vec![row(Sender::User, "hi"), row(Sender::Bot, "hello")],
            scroll_to: Some(1),
        };
        let mut shown = 0;
        print_new_rows(&view, &mut shown);
        assert_eq!(shown, 2);

        view.rows.push(row(Sender::User, "more"));
        view.rows.push(Row {
            is_typing: true,
            ..row(Sender::Bot, "...")
        });
        print_new_rows(&view, &mut shown);
        assert_eq!(shown, 3);
    }

    #[test]
    fn test_latest_offer() {
        let mut view = TranscriptView::default();
        assert_eq!(latest_offer(&view), None);
        view.rows.push(row(Sender::User, "hi"));
        view.rows.push(Row {
            action: Some("Yes, sign me up!"),
            ..row(Sender::Bot, "join?")
        });
        view.rows.push(row(Sender::Bot, "ok"));
        assert_eq!(latest_offer(&view), Some(1));
    }

    #[test]
    fn test_list_share_links_records_open() {
        let sink = RecordingSink::new();
        list_share_links(&ShareLinks::new("https://example.org/"), &sink);
        assert_eq!(sink.names(), vec![SHARE_MODAL_OPENED]);
        assert!(sink.events()[0].attributes.is_empty());
    }

    #[test]
    fn test_parse_platform() {
        assert_eq!(parse_platform("Twitter"), Some(Platform::Twitter));
        assert_eq!(parse_platform("myspace"), None);
    }
}

//! Terminal signup form opened from the chat's follow-up prompt.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use cw_core::analytics::{MODAL_OPENED, MODAL_SIGNUP_SOURCE, SIGNUP};
use cw_core::validate::{INVALID_EMAIL, INVALID_ZIP, REQUIRED};
use cw_core::{validate_email, validate_signup, validate_zip, AnalyticsEvent, AnalyticsSink, SignupFlow, SignupForm};

pub const SUCCESS_MESSAGE: &str = "Success! Thanks for signing up.";

/// The widget calls `open` while its own state is being updated, so this
/// only records the request; the chat loop runs the form afterwards.
#[derive(Debug, Default)]
pub struct TerminalSignup {
    requested: AtomicBool,
}

impl TerminalSignup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once per `open` call.
    pub fn take_request(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

impl SignupFlow for TerminalSignup {
    fn open(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

/// Ask for one field until `check` accepts it. `None` means the user gave up.
fn ask_field<F>(
    ask: &mut F,
    prompt: &str,
    check: fn(&str) -> Option<&'static str>,
) -> Result<Option<String>>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    loop {
        let Some(answer) = ask(prompt)? else {
            return Ok(None);
        };
        let answer = answer.trim().to_string();
        match check(&answer) {
            None => return Ok(Some(answer)),
            Some(problem) => println!("  {problem}"),
        }
    }
}

fn check_email(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some(REQUIRED)
    } else if !validate_email(value) {
        Some(INVALID_EMAIL)
    } else {
        None
    }
}

fn check_name(value: &str) -> Option<&'static str> {
    value.is_empty().then_some(REQUIRED)
}

fn check_zip(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some(REQUIRED)
    } else if !validate_zip(value) {
        Some(INVALID_ZIP)
    } else {
        None
    }
}

/// Collect a valid signup form. `ask` shows a prompt and returns the typed
/// line, or `None` when input was cancelled.
pub fn collect_form<F>(mut ask: F) -> Result<Option<SignupForm>>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let Some(email) = ask_field(&mut ask, "email> ", check_email)? else {
        return Ok(None);
    };
    let Some(first_name) = ask_field(&mut ask, "first name> ", check_name)? else {
        return Ok(None);
    };
    let Some(zip) = ask_field(&mut ask, "zip> ", check_zip)? else {
        return Ok(None);
    };

    let form = SignupForm {
        email,
        first_name,
        zip,
        phone: None,
    };
    if let Some(problem) = validate_signup(&form).into_iter().next() {
        anyhow::bail!("signup form rejected: {problem}");
    }
    Ok(Some(form))
}

/// Run the form and record a completed signup.
pub fn run_form<F>(ask: F, analytics: &dyn AnalyticsSink, page: &str) -> Result<bool>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    println!("Join the Movement to Flip CA-45");
    analytics.emit(AnalyticsEvent::new(MODAL_OPENED).with("type", "signup_modal"));
    match collect_form(ask)? {
        Some(form) => {
            analytics.emit(
                AnalyticsEvent::new(SIGNUP)
                    .with("email", form.email.as_str())
                    .with("source", MODAL_SIGNUP_SOURCE)
                    .with(
                        "tags",
                        vec![format!("signup_{MODAL_SIGNUP_SOURCE}"), "website_signup".to_string()],
                    )
                    .with("page", page),
            );
            println!("{SUCCESS_MESSAGE}\n");
            Ok(true)
        }
        None => {
            println!("Signup cancelled.\n");
            Ok(false)
        }
    }
}

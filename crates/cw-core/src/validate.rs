//! Signup field validation.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("zip pattern"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?([0-9]{3})\)?[-. ]?([0-9]{3})[-. ]?([0-9]{4})$").expect("phone pattern")
});

pub const INVALID_EMAIL: &str = "Please enter a valid email address";
pub const INVALID_ZIP: &str = "Please enter a valid ZIP code";
pub const INVALID_PHONE: &str = "Please enter a valid phone number";
pub const REQUIRED: &str = "This field is required";

pub fn validate_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Five-digit ZIP or ZIP+4.
pub fn validate_zip(zip: &str) -> bool {
    ZIP.is_match(zip)
}

/// US ten-digit number, optionally with parentheses and `-`, `.` or space
/// separators.
pub fn validate_phone(phone: &str) -> bool {
    PHONE.is_match(phone)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub email: String,
    pub first_name: String,
    pub zip: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every field, returning all problems found (empty when valid).
pub fn validate_signup(form: &SignupForm) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let email = form.email.trim();
    if email.is_empty() {
        errors.push(FieldError { field: "email", message: REQUIRED });
    } else if !validate_email(email) {
        errors.push(FieldError { field: "email", message: INVALID_EMAIL });
    }

    if form.first_name.trim().is_empty() {
        errors.push(FieldError { field: "firstname", message: REQUIRED });
    }

    let zip = form.zip.trim();
    if zip.is_empty() {
        errors.push(FieldError { field: "zip", message: REQUIRED });
    } else if !validate_zip(zip) {
        errors.push(FieldError { field: "zip", message: INVALID_ZIP });
    }

    if let Some(phone) = form.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        if !validate_phone(phone) {
            errors.push(FieldError { field: "phone", message: INVALID_PHONE });
        }
    }

    errors
}

//! Social share links for the current page.

use crate::analytics::{AnalyticsEvent, AnalyticsSink, SOCIAL_SHARE};

pub const SHARE_TEXT: &str = "I'm supporting Amy Phan West for Congress CA-45. She fled communism and is fighting to defend the American Dream!";
pub const EMAIL_SUBJECT: &str = "Support Amy Phan West for Congress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Facebook,
    Twitter,
    Email,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Email => "email",
        }
    }

    pub fn all() -> [Platform; 3] {
        [Platform::Facebook, Platform::Twitter, Platform::Email]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub facebook: String,
    pub twitter: String,
    pub email: String,
}

impl ShareLinks {
    pub fn new(page_url: &str) -> Self {
        Self::with_text(page_url, SHARE_TEXT)
    }

    pub fn with_text(page_url: &str, text: &str) -> Self {
        let url = encode_component(page_url);
        let text = encode_component(text);
        Self {
            facebook: format!("https://www.facebook.com/sharer/sharer.php?u={url}"),
            twitter: format!("https://twitter.com/intent/tweet?url={url}&text={text}"),
            email: format!("mailto:?subject={EMAIL_SUBJECT}&body={text}%0A%0A{url}"),
        }
    }

    pub fn get(&self, platform: Platform) -> &str {
        match platform {
            Platform::Facebook => &self.facebook,
            Platform::Twitter => &self.twitter,
            Platform::Email => &self.email,
        }
    }
}

/// Percent-encode like a browser's `encodeURIComponent`, which leaves the
/// marks `!'()*` as they are.
fn encode_component(input: &str) -> String {
    [("%21", "!"), ("%27", "'"), ("%28", "("), ("%29", ")"), ("%2A", "*")]
        .iter()
        .fold(urlencoding::encode(input).into_owned(), |acc, (escaped, mark)| {
            acc.replace(escaped, mark)
        })
}

/// Record that the visitor shared `page` on `platform`.
pub fn track_share(analytics: &dyn AnalyticsSink, platform: Platform, page: &str) {
    analytics.emit(
        AnalyticsEvent::new(SOCIAL_SHARE)
            .with("platform", platform.as_str())
            .with("page", page),
    );
}

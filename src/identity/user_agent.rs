//! Best-effort User-Agent parsing.
//!
//! Recognizes the common desktop and mobile platforms and browsers by token
//! matching. Anything unrecognized yields an empty string.

/// Operating system and browser names detected in a User-Agent string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    /// Platform name, empty if unrecognized.
    pub os: String,
    /// Browser name, empty if unrecognized.
    pub browser: String,
}

// Ordered: more specific tokens first (Android UAs also contain "Linux",
// iOS UAs contain "Mac OS X").
const PLATFORMS: &[(&str, &str)] = &[
    ("Windows", "Windows"),
    ("Android", "Android"),
    ("iPhone", "iOS"),
    ("iPad", "iOS"),
    ("iPod", "iOS"),
    ("CrOS", "ChromeOS"),
    ("Macintosh", "Macintosh"),
    ("Mac OS X", "Macintosh"),
    ("Linux", "Linux"),
];

// Ordered: Edge and Opera carry "Chrome/", Chrome carries "Safari/".
const BROWSERS: &[(&str, &str)] = &[
    ("Edg/", "Microsoft Edge"),
    ("Edge/", "Microsoft Edge"),
    ("OPR/", "Opera"),
    ("Opera", "Opera"),
    ("SamsungBrowser/", "Samsung Internet"),
    ("Firefox/", "Firefox"),
    ("FxiOS/", "Firefox"),
    ("CriOS/", "Chrome"),
    ("Chrome/", "Chrome"),
    ("Safari/", "Safari"),
    ("MSIE ", "Microsoft Internet Explorer"),
    ("Trident/", "Microsoft Internet Explorer"),
    ("curl/", "curl"),
];

/// Parse a User-Agent header value
pub fn parse(user_agent: &str) -> UserAgentInfo {
    UserAgentInfo {
        os: first_match(user_agent, PLATFORMS),
        browser: first_match(user_agent, BROWSERS),
    }
}

fn first_match(user_agent: &str, table: &[(&str, &str)]) -> String {
    table
        .iter()
        .find(|(token, _)| user_agent.contains(token))
        .map(|(_, name)| name.to_string())
        .unwrap_or_default()
}

use std::sync::OnceLock;

use regex::Regex;

/// Device signals recovered from a `User-Agent` header. Fields that cannot be
/// recovered stay empty (or `false`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAgentInfo {
    pub mobile: bool,
    pub platform: String,
    pub os: String,
    pub browser: String,
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([^()]*)\)").expect("comment pattern must compile"))
}

fn windows_nt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Windows NT (\d+\.\d+)").expect("windows nt pattern must compile")
    })
}

pub fn parse(user_agent: &str) -> UserAgentInfo {
    let user_agent = user_agent.trim();
    if user_agent.is_empty() {
        return UserAgentInfo::default();
    }

    let tokens: Vec<&str> = comment_pattern()
        .captures(user_agent)
        .and_then(|captures| captures.get(1))
        .map(|comment| {
            comment
                .as_str()
                .split(';')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let (platform, os) = platform_and_os(&tokens);
    let mobile = user_agent.contains("Mobi") || matches!(platform.as_str(), "iPhone" | "iPod");

    UserAgentInfo {
        mobile,
        platform,
        os,
        browser: browser_family(user_agent).to_string(),
    }
}

fn platform_and_os(tokens: &[&str]) -> (String, String) {
    let Some(first) = tokens.first().copied() else {
        return (String::new(), String::new());
    };
    let second = tokens.get(1).copied().unwrap_or_default();

    if first.starts_with("Windows") {
        let os = tokens
            .iter()
            .find(|token| token.starts_with("Windows"))
            .map(|token| windows_name(token))
            .unwrap_or_default();
        return ("Windows".to_string(), os);
    }

    match first {
        "Macintosh" | "iPhone" | "iPad" | "iPod" => (first.to_string(), second.to_string()),
        "Linux" | "X11" => {
            let os = tokens
                .iter()
                .find(|token| token.starts_with("Android"))
                .or_else(|| tokens.iter().find(|token| token.starts_with("Linux")))
                .copied()
                .unwrap_or(first);
            (first.to_string(), os.to_string())
        }
        _ if first.starts_with("Android") => ("Android".to_string(), first.to_string()),
        _ => (first.to_string(), second.to_string()),
    }
}

fn windows_name(token: &str) -> String {
    let Some(version) = windows_nt_pattern()
        .captures(token)
        .and_then(|captures| captures.get(1))
    else {
        return token.to_string();
    };

    match version.as_str() {
        "10.0" => "Windows 10".to_string(),
        "6.3" => "Windows 8.1".to_string(),
        "6.2" => "Windows 8".to_string(),
        "6.1" => "Windows 7".to_string(),
        "6.0" => "Windows Vista".to_string(),
        "5.1" | "5.2" => "Windows XP".to_string(),
        other => format!("Windows NT {other}"),
    }
}

// Order matters: most engines advertise the tokens of the ones they derive from.
fn browser_family(user_agent: &str) -> &'static str {
    if ["Edg/", "EdgA/", "EdgiOS/", "Edge/"]
        .iter()
        .any(|marker| user_agent.contains(marker))
    {
        "Edge"
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("SamsungBrowser/") {
        "Samsung Internet"
    } else if user_agent.contains("Firefox/") || user_agent.contains("FxiOS/") {
        "Firefox"
    } else if user_agent.contains("Chromium/") {
        "Chromium"
    } else if user_agent.contains("Chrome/") || user_agent.contains("CriOS/") {
        "Chrome"
    } else if user_agent.contains("Safari/") && user_agent.contains("Version/") {
        "Safari"
    } else if user_agent.contains("MSIE ") || user_agent.contains("Trident/") {
        "Internet Explorer"
    } else {
        ""
    }
}

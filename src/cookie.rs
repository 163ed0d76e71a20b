use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};

use crate::decision_service::types::Token;

pub const AMP_TOKEN_COOKIE: &str = "AmpToken";

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("token contains a character not allowed in a cookie value: {0:?}")]
    InvalidOctet(char),
    #[error("invalid set-cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Carries the visitor's token in a session cookie.
#[derive(Debug, Clone, Copy)]
pub struct TokenCookieStore {
    name: &'static str,
}

impl Default for TokenCookieStore {
    fn default() -> Self {
        Self::new(AMP_TOKEN_COOKIE)
    }
}

impl TokenCookieStore {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// A missing, unreadable or empty cookie means "no prior token".
    pub fn read(&self, headers: &HeaderMap) -> Option<Token> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .and_then(|(_, value)| Token::parse(value.trim_matches('"')))
    }

    /// Appends `Set-Cookie` for the token. No `Expires`/`Max-Age`, so the
    /// browser keeps it for the session only.
    pub fn write(&self, headers: &mut HeaderMap, token: &Token) -> Result<(), CookieError> {
        let raw = token.as_str();
        if let Some(bad) = raw.chars().find(|ch| !is_cookie_octet(*ch)) {
            return Err(CookieError::InvalidOctet(bad));
        }

        let value = HeaderValue::from_str(&format!("{}={}; Path=/", self.name, raw))?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }
}

// RFC 6265 cookie-octet.
fn is_cookie_octet(ch: char) -> bool {
    matches!(ch, '\x21' | '\x23'..='\x2b' | '\x2d'..='\x3a' | '\x3c'..='\x5b' | '\x5d'..='\x7e')
}

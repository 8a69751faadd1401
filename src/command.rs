// shopwire/src/command.rs

use crate::errors::{AppError, AppResult};

/// The closed set of wire commands. Unknown keywords never reach a
/// handler; they are a normal error path at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Login,
    SearchProduct,
    ImageSearch,
    Logout,
    GetSessions,
    Exit,
}

impl Keyword {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "LOGIN" => Some(Keyword::Login),
            "SEARCH_PRODUCT" => Some(Keyword::SearchProduct),
            "IMAGE_SEARCH" => Some(Keyword::ImageSearch),
            "LOGOUT" => Some(Keyword::Logout),
            "GET_SESSIONS" => Some(Keyword::GetSessions),
            "EXIT" => Some(Keyword::Exit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Login => "LOGIN",
            Keyword::SearchProduct => "SEARCH_PRODUCT",
            Keyword::ImageSearch => "IMAGE_SEARCH",
            Keyword::Logout => "LOGOUT",
            Keyword::GetSessions => "GET_SESSIONS",
            Keyword::Exit => "EXIT",
        }
    }
}

/// One parsed request line: keyword plus positional arguments. Parsed
/// once per frame, immutable afterwards.
#[derive(Debug, Clone)]
pub struct Command {
    pub keyword: Keyword,
    pub args: Vec<String>,
}

/// Outcome of parsing one inbound frame as a command line.
#[derive(Debug)]
pub enum Parsed {
    Command(Command),
    /// Frame decoded but contained no tokens.
    Empty,
    /// First token is not a recognized keyword (already uppercased).
    Unknown(String),
}

/// Decode a frame payload as UTF-8 text and split it into a command.
/// The keyword is case-insensitive on the wire and normalized to
/// uppercase here; remaining whitespace-separated tokens are positional
/// arguments.
pub fn parse(payload: &[u8]) -> AppResult<Parsed> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| AppError::Decode("command is not valid UTF-8".into()))?;

    let mut tokens = text.split_whitespace();
    let first = match tokens.next() {
        Some(t) => t.to_uppercase(),
        None => return Ok(Parsed::Empty),
    };

    match Keyword::from_token(&first) {
        Some(keyword) => Ok(Parsed::Command(Command {
            keyword,
            args: tokens.map(str::to_string).collect(),
        })),
        None => Ok(Parsed::Unknown(first)),
    }
}

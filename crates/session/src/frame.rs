//! STOMP 1.2 frame codec
//!
//! ```text
//! COMMAND\n
//! name:value\n
//! ...\n
//! \n
//! body\0
//! ```
//!
//! Header names and values are escaped (`\n`, `\r`, `\c`, `\\`) except on
//! CONNECT and CONNECTED. A `content-length` header fixes the body size so
//! the body may itself contain NUL; without it the body runs to the first
//! NUL. A bare EOL between frames is a heart-beat.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// One STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// In wire order; repeated names are kept, the first one wins on lookup
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize, computing `content-length` from the body
    pub fn encode(&self) -> String {
        let escaped = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());

        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if name == "content-length" {
                continue;
            }
            if escaped {
                push_escaped(&mut out, name);
                out.push(':');
                push_escaped(&mut out, value);
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

fn push_escaped(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(FrameError::InvalidEscape(other)),
            None => return Err(FrameError::MalformedHeader(raw.to_string())),
        }
    }
    Ok(out)
}

/// Locate the blank line ending the header block
///
/// Returns (end of headers, start of body).
fn find_blank_line(buf: &str) -> Option<(usize, usize)> {
    let bytes = buf.as_bytes();
    let mut from = 0;
    while let Some(pos) = buf[from..].find('\n') {
        let nl = from + pos;
        let rest = &bytes[nl + 1..];
        if rest.starts_with(b"\n") {
            return Some((nl, nl + 2));
        }
        if rest.starts_with(b"\r\n") {
            return Some((nl, nl + 3));
        }
        from = nl + 1;
    }
    None
}

/// Something read off the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Heartbeat,
    Frame(Frame),
}

/// Incremental frame parser
///
/// Transport messages need not align with frames: one message may carry
/// several frames and a frame may span messages.
/// Largest frame accepted, headers and body included
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug)]
pub struct FrameParser {
    buffer: String,
    max_frame_size: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: String::new(),
            max_frame_size,
        }
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed data; returns every complete item now available
    ///
    /// On error the buffer is discarded, the stream cannot be resynchronized.
    pub fn push(&mut self, data: &str) -> Result<Vec<Incoming>, FrameError> {
        self.buffer.push_str(data);
        let mut items = Vec::new();
        loop {
            match self.next_incoming() {
                Ok(Some(item)) => items.push(item),
                Ok(None) if self.buffer.len() > self.max_frame_size => {
                    self.buffer.clear();
                    return Err(FrameError::TooLarge(self.max_frame_size));
                }
                Ok(None) => return Ok(items),
                Err(e) => {
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }
    }

    fn next_incoming(&mut self) -> Result<Option<Incoming>, FrameError> {
        if self.buffer.starts_with('\n') {
            self.buffer.drain(..1);
            return Ok(Some(Incoming::Heartbeat));
        }
        if self.buffer.starts_with("\r\n") {
            self.buffer.drain(..2);
            return Ok(Some(Incoming::Heartbeat));
        }

        let Some((header_end, body_start)) = find_blank_line(&self.buffer) else {
            return Ok(None);
        };

        let mut lines = self.buffer[..header_end]
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line));
        let command: Command = lines.next().unwrap_or_default().parse()?;
        let escaped = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if escaped {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| FrameError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let (body_end, frame_end) = match content_length {
            Some(len) => {
                let end = body_start
                    .checked_add(len)
                    .filter(|end| *end < self.max_frame_size)
                    .ok_or(FrameError::TooLarge(self.max_frame_size))?;
                if self.buffer.len() <= end {
                    return Ok(None);
                }
                if self.buffer.as_bytes()[end] != 0 {
                    return Err(FrameError::MissingTerminator);
                }
                (end, end + 1)
            }
            None => match self.buffer[body_start..].find('\0') {
                Some(pos) => (body_start + pos, body_start + pos + 1),
                None => return Ok(None),
            },
        };

        let body = self
            .buffer
            .get(body_start..body_end)
            .ok_or_else(|| FrameError::InvalidContentLength((body_end - body_start).to_string()))?
            .to_string();
        self.buffer.drain(..frame_end);

        Ok(Some(Incoming::Frame(Frame {
            command,
            headers,
            body,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(items: Vec<Incoming>) -> Vec<Frame> {
        items
            .into_iter()
            .filter_map(|item| match item {
                Incoming::Frame(frame) => Some(frame),
                Incoming::Heartbeat => None,
            })
            .collect()
    }

    #[test]
    fn test_encode_send() {
        let frame = Frame::new(Command::Send)
            .with_header("destination", "/app/location/update")
            .with_header("content-type", "application/json")
            .with_body(r#"{"assetId":7}"#);

        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/location/update\ncontent-type:application/json\ncontent-length:13\n\n{\"assetId\":7}\0"
        );
    }

    #[test]
    fn test_encode_escapes_headers_except_connect() {
        let send = Frame::new(Command::Send).with_header("note", "a:b\nc\\");
        assert_eq!(send.encode(), "SEND\nnote:a\\cb\\nc\\\\\n\n\0");

        let connect = Frame::new(Command::Connect).with_header("host", "tracker:8080");
        assert_eq!(connect.encode(), "CONNECT\nhost:tracker:8080\n\n\0");
    }

    #[test]
    fn test_parse_message_with_escaped_headers() {
        let mut parser = FrameParser::new();
        let raw = "MESSAGE\ndestination:/topic/location/all\nsubscription:sub-0\nnote:a\\cb\\nc\n\n{}\0";

        let parsed = frames(parser.push(raw).unwrap());
        assert_eq!(parsed.len(), 1);
        let frame = &parsed[0];
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header("destination"), Some("/topic/location/all"));
        assert_eq!(frame.header("note"), Some("a:b\nc"));
        assert_eq!(frame.body, "{}");
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_connected_headers_not_unescaped() {
        let mut parser = FrameParser::new();
        let parsed = frames(
            parser
                .push("CONNECTED\nversion:1.2\nserver:broker\\c1\nheart-beat:10000,10000\n\n\0")
                .unwrap(),
        );
        assert_eq!(parsed[0].header("server"), Some("broker\\c1"));
        assert_eq!(parsed[0].header("heart-beat"), Some("10000,10000"));
    }

    #[test]
    fn test_multiple_frames_and_heartbeats_in_one_message() {
        let mut parser = FrameParser::new();
        let items = parser
            .push("\nRECEIPT\nreceipt-id:1\n\n\0\r\nMESSAGE\ndestination:/a\n\nx\0\n")
            .unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(items[0], Incoming::Heartbeat);
        assert!(matches!(&items[1], Incoming::Frame(f) if f.command == Command::Receipt));
        assert_eq!(items[2], Incoming::Heartbeat);
        assert!(matches!(&items[3], Incoming::Frame(f) if f.body == "x"));
        assert_eq!(items[4], Incoming::Heartbeat);
    }

    #[test]
    fn test_partial_frame_across_messages() {
        let mut parser = FrameParser::new();
        assert!(parser.push("MESSAGE\ndestin").unwrap().is_empty());
        assert!(parser.push("ation:/topic/x\n").unwrap().is_empty());
        assert!(parser.push("\n{\"a\":").unwrap().is_empty());

        let parsed = frames(parser.push("1}\0").unwrap());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].body, "{\"a\":1}");
    }

    #[test]
    fn test_content_length_body_with_nul() {
        let mut parser = FrameParser::new();
        let parsed = frames(
            parser
                .push("MESSAGE\ndestination:/a\ncontent-length:3\n\na\0b\0")
                .unwrap(),
        );
        assert_eq!(parsed[0].body, "a\0b");
    }

    #[test]
    fn test_content_length_counts_bytes() {
        let mut parser = FrameParser::new();
        let parsed = frames(
            parser
                .push("MESSAGE\ncontent-length:7\n\nGenève\0")
                .unwrap(),
        );
        assert_eq!(parsed[0].body, "Genève");
    }

    #[test]
    fn test_content_length_mismatch() {
        let mut parser = FrameParser::new();
        assert_eq!(
            parser.push("MESSAGE\ncontent-length:1\n\nabc\0"),
            Err(FrameError::MissingTerminator)
        );
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_oversized_content_length_fails_frame() {
        let mut parser = FrameParser::new();
        assert_eq!(
            parser.push("MESSAGE\ncontent-length:18446744073709551615\n\nx\0"),
            Err(FrameError::TooLarge(DEFAULT_MAX_FRAME_SIZE))
        );
        assert_eq!(parser.buffered(), 0);

        assert_eq!(
            parser.push("MESSAGE\ncontent-length:1000000000000\n\nx"),
            Err(FrameError::TooLarge(DEFAULT_MAX_FRAME_SIZE))
        );

        // Still usable afterwards
        let parsed = frames(parser.push("MESSAGE\n\nok\0").unwrap());
        assert_eq!(parsed[0].body, "ok");
    }

    #[test]
    fn test_unterminated_frame_over_limit_fails() {
        let mut parser = FrameParser::with_max_frame_size(16);
        assert_eq!(parser.push("MESSAGE\n\n0123"), Ok(Vec::new()));
        assert_eq!(
            parser.push("456789abcdef"),
            Err(FrameError::TooLarge(16))
        );
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_unknown_command() {
        let mut parser = FrameParser::new();
        assert_eq!(
            parser.push("HELLO\n\n\0"),
            Err(FrameError::UnknownCommand("HELLO".to_string()))
        );
    }

    #[test]
    fn test_encode_then_parse() {
        let frame = Frame::new(Command::Message)
            .with_header("destination", "/topic/geofence/events")
            .with_header("message-id", "m:1")
            .with_body("{\"eventId\":1}");

        let mut parser = FrameParser::new();
        let parsed = frames(parser.push(&frame.encode()).unwrap());
        assert_eq!(parsed[0].header("message-id"), Some("m:1"));
        assert_eq!(parsed[0].body, frame.body);
    }
}

//! STOMP 1.2 frame codec.
//!
//! The push channel speaks STOMP over WebSocket text messages, one frame per
//! message. A message consisting only of end-of-line bytes is a heartbeat.
//!
//! ```text
//! COMMAND\n
//! header:value\n
//! \n
//! body\0
//! ```

use std::fmt;
use std::time::Duration;

use crate::WireError;

/// Protocol version we negotiate.
pub const STOMP_VERSION: &str = "1.2";

/// Frame commands used by the chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Server handshake reply.
    Connected,
    /// Client publish.
    Send,
    /// Client subscription request.
    Subscribe,
    /// Client subscription release.
    Unsubscribe,
    /// Server delivery on a subscription.
    Message,
    /// Server receipt.
    Receipt,
    /// Server-side error; the server closes the connection after it.
    Error,
    /// Client graceful shutdown.
    Disconnect,
}

impl Command {
    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Result<Self, WireError> {
        Ok(match s {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            other => return Err(WireError::UnknownCommand(other.to_string())),
        })
    }

    /// CONNECT and CONNECTED frames never escape header values.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    headers: Vec<(String, String)>,
    /// Frame body (UTF-8; the chat channel only carries JSON).
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header. Repeated headers resolve to the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All headers in wire order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serialize to wire text, NUL-terminated.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Anything that can arrive on the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Keep-alive EOL.
    Heartbeat,
    /// A full frame.
    Frame(Frame),
}

/// Decode one WebSocket text message.
pub fn decode(text: &str) -> Result<Inbound, WireError> {
    let text = text.trim_start_matches(['\r', '\n']);
    if text.is_empty() {
        return Ok(Inbound::Heartbeat);
    }

    let (head, rest) = split_line(text).ok_or_else(|| malformed("missing command line"))?;
    let command = Command::parse(head)?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    let mut remaining = rest;
    loop {
        let (line, tail) =
            split_line(remaining).ok_or_else(|| malformed("unterminated header block"))?;
        remaining = tail;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| malformed("header without ':'"))?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let frame = Frame {
        command,
        headers,
        body: String::new(),
    };

    let body = match frame.get("content-length") {
        Some(len) => {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| malformed("invalid content-length"))?;
            remaining
                .get(..len)
                .ok_or_else(|| malformed("body shorter than content-length"))?
        }
        None => remaining
            .split_once('\0')
            .map(|(body, _)| body)
            .ok_or_else(|| malformed("missing NUL terminator"))?,
    };

    Ok(Inbound::Frame(Frame {
        body: body.to_string(),
        ..frame
    }))
}

/// Heartbeat intervals, as carried by the `heart-beat` header.
///
/// A zero interval disables that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// How often this side can send.
    pub outgoing: Duration,
    /// How often this side wants to receive.
    pub incoming: Duration,
}

impl HeartBeat {
    /// Build from millisecond values.
    pub fn from_millis(outgoing: u64, incoming: u64) -> Self {
        Self {
            outgoing: Duration::from_millis(outgoing),
            incoming: Duration::from_millis(incoming),
        }
    }

    /// Parse a `heart-beat` header value (`"cx,cy"`).
    pub fn parse(value: &str) -> Result<Self, WireError> {
        let (out, inc) = value
            .split_once(',')
            .ok_or_else(|| malformed("heart-beat header needs two values"))?;
        let out: u64 = out
            .trim()
            .parse()
            .map_err(|_| malformed("invalid heart-beat value"))?;
        let inc: u64 = inc
            .trim()
            .parse()
            .map_err(|_| malformed("invalid heart-beat value"))?;
        Ok(Self::from_millis(out, inc))
    }

    /// Header value.
    pub fn to_header(&self) -> String {
        format!(
            "{},{}",
            self.outgoing.as_millis(),
            self.incoming.as_millis()
        )
    }

    /// Negotiate against the server's advertised values.
    ///
    /// Returns `(send_every, expect_every)`; `None` disables a direction.
    pub fn negotiate(&self, server: &HeartBeat) -> (Option<Duration>, Option<Duration>) {
        let pick = |ours: Duration, theirs: Duration| {
            (!ours.is_zero() && !theirs.is_zero()).then(|| ours.max(theirs))
        };
        (
            pick(self.outgoing, server.incoming),
            pick(self.incoming, server.outgoing),
        )
    }
}

/// A heartbeat as sent on the wire.
pub const HEARTBEAT_EOL: &str = "\n";

fn split_line(text: &str) -> Option<(&str, &str)> {
    let idx = text.find('\n')?;
    let line = text[..idx].strip_suffix('\r').unwrap_or(&text[..idx]);
    Some((line, &text[idx + 1..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, WireError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
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
            _ => return Err(malformed("invalid header escape")),
        }
    }
    Ok(out)
}

fn malformed(reason: &str) -> WireError {
    WireError::MalformedFrame(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(inbound: Inbound) -> Frame {
        match inbound {
            Inbound::Frame(f) => f,
            Inbound::Heartbeat => panic!("expected frame, got heartbeat"),
        }
    }

    // ===========================================
    // Encoding Tests
    // ===========================================

    #[test]
    fn encodes_subscribe() {
        let frame = Frame::new(Command::Subscribe)
            .header("id", "sub-0")
            .header("destination", "/group/g1/messages");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/group/g1/messages\n\n\0"
        );
    }

    #[test]
    fn send_adds_content_length() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/group-message")
            .body("{\"a\":1}");
        let wire = frame.encode();
        assert!(wire.contains("content-length:7\n"));
        assert!(wire.ends_with("\n\n{\"a\":1}\0"));
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let frame = Frame::new(Command::Connect).header("host", "chat.example:8080");
        assert!(frame.encode().contains("host:chat.example:8080\n"));
    }

    // ===========================================
    // Decoding Tests
    // ===========================================

    #[test]
    fn decodes_message_frame() {
        let wire = "MESSAGE\nsubscription:sub-1\ndestination:/user/A/private\nmessage-id:7\n\n{\"x\":1}\0";
        let frame = frame_of(decode(wire).unwrap());

        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-1"));
        assert_eq!(frame.get("destination"), Some("/user/A/private"));
        assert_eq!(frame.body, "{\"x\":1}");
    }

    #[test]
    fn decodes_with_content_length_and_crlf() {
        let wire = "MESSAGE\r\ncontent-length:2\r\n\r\nhi\0\n";
        let frame = frame_of(decode(wire).unwrap());
        assert_eq!(frame.body, "hi");
    }

    #[test]
    fn lone_eol_is_heartbeat() {
        assert_eq!(decode("\n").unwrap(), Inbound::Heartbeat);
        assert_eq!(decode("\r\n").unwrap(), Inbound::Heartbeat);
    }

    #[test]
    fn leading_heartbeats_are_skipped() {
        let frame = frame_of(decode("\n\nRECEIPT\nreceipt-id:1\n\n\0").unwrap());
        assert_eq!(frame.command, Command::Receipt);
    }

    #[test]
    fn escaped_headers_roundtrip_through_decode() {
        let frame = Frame::new(Command::Message).header("note", "a:b\\c");
        let decoded = frame_of(decode(&frame.encode()).unwrap());
        assert_eq!(decoded.get("note"), Some("a:b\\c"));
    }

    #[test]
    fn first_repeated_header_wins() {
        let frame = frame_of(decode("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap());
        assert_eq!(frame.get("foo"), Some("1"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode("HELLO\n\n\0"),
            Err(WireError::UnknownCommand(_))
        ));
        assert!(matches!(
            decode("MESSAGE\nno-colon\n\n\0"),
            Err(WireError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode("MESSAGE\n\nbody without terminator"),
            Err(WireError::MalformedFrame(_))
        ));
    }

    // ===========================================
    // Heartbeat Negotiation Tests
    // ===========================================

    #[test]
    fn heartbeat_negotiation_takes_max() {
        let ours = HeartBeat::from_millis(4000, 4000);
        let server = HeartBeat::parse("10000,0").unwrap();
        let (send, expect) = ours.negotiate(&server);

        // Server doesn't want our heartbeats (incoming 0)
        assert_eq!(send, None);
        assert_eq!(expect, Some(Duration::from_millis(10000)));
    }

    #[test]
    fn heartbeat_zero_disables() {
        let ours = HeartBeat::from_millis(0, 0);
        let server = HeartBeat::from_millis(5000, 5000);
        assert_eq!(ours.negotiate(&server), (None, None));
    }

    #[test]
    fn heartbeat_header_format() {
        assert_eq!(HeartBeat::from_millis(4000, 2500).to_header(), "4000,2500");
        assert!(HeartBeat::parse("abc").is_err());
    }
}

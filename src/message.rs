use std::io::{Read, Write};

use crate::error::SUCCESS;
use crate::xml::{self, XmlReader};
use crate::{KvsError, Result};

/// name of the root element of every message
const ROOT: &str = "KVMessage";
const CLOSING_ROOT: &[u8] = b"</KVMessage>";
/// the most bytes [`KvMessage::read_from`] buffers before giving up on a message
pub const MAX_MESSAGE_LEN: usize = 1 << 20;

/// The messages exchanged between a [`KvsClient`] and a server, one request and one response
/// per connection.
///
/// On the wire every message is a small XML document:
///
/// ```text
/// <KVMessage type="putreq"><Key>K</Key><Value>V</Value></KVMessage>
/// <KVMessage type="getreq"><Key>K</Key></KVMessage>
/// <KVMessage type="delreq"><Key>K</Key></KVMessage>
/// <KVMessage type="resp">[<Key>K</Key>][<Value>V</Value>][<Message>M</Message>]</KVMessage>
/// ```
///
/// [`KvsClient`]: ./struct.KvsClient.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvMessage {
    /// store `value` under `key`
    PutRequest {
        /// the key to set
        key: String,
        /// the value to set
        value: String,
    },
    /// fetch the value of `key`
    GetRequest {
        /// the key to search for
        key: String,
    },
    /// remove `key` and its value
    DelRequest {
        /// the key to remove
        key: String,
    },
    /// the answer to any request
    Response {
        /// the key that was read, on a successful get
        key: Option<String>,
        /// the value that was read, on a successful get
        value: Option<String>,
        /// `"Success"` for put/del, or the text of the failure
        message: Option<String>,
    },
}

impl KvMessage {
    /// the response sent when a put or del succeeded
    pub fn success() -> Self {
        KvMessage::Response {
            key: None,
            value: None,
            message: Some(SUCCESS.to_string()),
        }
    }

    /// the response sent when a get succeeded
    pub fn found(key: String, value: String) -> Self {
        KvMessage::Response {
            key: Some(key),
            value: Some(value),
            message: None,
        }
    }

    /// a response that reports a failure with the given text
    pub fn failure(message: impl Into<String>) -> Self {
        KvMessage::Response {
            key: None,
            value: None,
            message: Some(message.into()),
        }
    }

    /// the value of the `type` attribute used on the wire for this message
    pub fn type_tag(&self) -> &'static str {
        match self {
            KvMessage::PutRequest { .. } => "putreq",
            KvMessage::GetRequest { .. } => "getreq",
            KvMessage::DelRequest { .. } => "delreq",
            KvMessage::Response { .. } => "resp",
        }
    }

    /// the key carried by this message, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            KvMessage::PutRequest { key, .. }
            | KvMessage::GetRequest { key }
            | KvMessage::DelRequest { key } => Some(key.as_str()),
            KvMessage::Response { key, .. } => key.as_deref(),
        }
    }

    /// the value carried by this message, if any
    pub fn value(&self) -> Option<&str> {
        match self {
            KvMessage::PutRequest { value, .. } => Some(value.as_str()),
            KvMessage::Response { value, .. } => value.as_deref(),
            _ => None,
        }
    }

    /// the status or error text carried by this message, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            KvMessage::Response { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// serializes this message into its XML document
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(96);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        out.push_str("<KVMessage type=\"");
        out.push_str(self.type_tag());
        out.push_str("\">");
        if let Some(key) = self.key() {
            xml::push_text_element(&mut out, "Key", key);
        }
        if let Some(value) = self.value() {
            xml::push_text_element(&mut out, "Value", value);
        }
        if let Some(message) = self.message() {
            xml::push_text_element(&mut out, "Message", message);
        }
        out.push_str("</KVMessage>");
        out
    }

    /// parses a message from its XML document.
    ///
    /// # Errors
    /// returns [`KvsError::InvalidFormat`] if the document is malformed, the `type` is unknown,
    /// a child element is unknown or repeated, or a request lacks a field it requires.
    /// [`KvsError::to_response`] turns that error into the reply for the peer.
    pub fn decode(doc: &str) -> Result<KvMessage> {
        let mut reader = XmlReader::new(doc);
        reader.skip_prolog()?;
        let root = reader.start_tag()?;
        if root.name != ROOT {
            return Err(KvsError::InvalidFormat);
        }
        let msg_type = root.attr("type").ok_or(KvsError::InvalidFormat)?.to_string();

        let mut key = None;
        let mut value = None;
        let mut message = None;
        if !root.empty {
            while !reader.at_end_tag() {
                let child = reader.start_tag()?;
                let slot = match child.name {
                    "Key" => &mut key,
                    "Value" => &mut value,
                    "Message" => &mut message,
                    _ => return Err(KvsError::InvalidFormat),
                };
                if slot.is_some() {
                    return Err(KvsError::InvalidFormat);
                }
                *slot = Some(reader.text_content(&child)?);
            }
            reader.end_tag(ROOT)?;
        }
        reader.finish()?;

        match (msg_type.as_str(), key, value, message) {
            ("putreq", Some(key), Some(value), None) => Ok(KvMessage::PutRequest { key, value }),
            ("getreq", Some(key), None, None) => Ok(KvMessage::GetRequest { key }),
            ("delreq", Some(key), None, None) => Ok(KvMessage::DelRequest { key }),
            ("resp", key, value, message) => Ok(KvMessage::Response { key, value, message }),
            _ => Err(KvsError::InvalidFormat),
        }
    }

    /// reads exactly one message from `reader`.
    ///
    /// Bytes are consumed until the closing `</KVMessage>` tag arrives or the peer stops
    /// sending, so the peer does not have to shut down its side of the connection first.
    ///
    /// # Errors
    /// any read failure, undecodable input, or more than [`MAX_MESSAGE_LEN`] bytes without a
    /// closing tag is reported as [`KvsError::InvalidFormat`]
    pub fn read_from<R: Read>(reader: &mut R) -> Result<KvMessage> {
        let mut buf = Vec::with_capacity(256);
        let mut chunk = [0_u8; 1024];
        loop {
            let n = reader.read(&mut chunk).map_err(|_| KvsError::InvalidFormat)?;
            if n == 0 {
                break;
            }
            // only the freshly read bytes (plus an overlap for a split tag) need scanning
            let scan_from = buf.len().saturating_sub(CLOSING_ROOT.len());
            buf.extend_from_slice(&chunk[..n]);
            if buf.len() > MAX_MESSAGE_LEN {
                return Err(KvsError::InvalidFormat);
            }
            if buf[scan_from..]
                .windows(CLOSING_ROOT.len())
                .any(|w| w == CLOSING_ROOT)
            {
                break;
            }
        }
        let doc = std::str::from_utf8(&buf).map_err(|_| KvsError::InvalidFormat)?;
        KvMessage::decode(doc)
    }

    /// writes this message to `writer` and flushes it
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.encode().as_bytes())?;
        writer.flush()
    }
}

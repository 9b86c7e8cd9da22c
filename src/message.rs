//! In-memory representation of a single decoded syslog message.

use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::facility::Facility;
use crate::severity::Severity;
use crate::structured_data::StructuredElement;

/// A RFC 5424 syslog message.
///
/// Every field is owned, so the buffer the message was decoded from can be
/// reused right away. Fields sent as the NILVALUE `-` are `None`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedMessage {
    /// `facility * 8 + severity`, 0 to 191
    pub priority: u8,
    pub version: u32,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub hostname: Option<String>,
    pub app_name: Option<String>,
    pub proc_id: Option<String>,
    pub msg_id: Option<String>,
    pub structured_data: Vec<StructuredElement>,
    pub msg: String,
}

impl DecodedMessage {
    pub fn facility(&self) -> Facility {
        // priority is capped at 191 when decoding, which is local7
        Facility::from_priority(self.priority).unwrap_or(Facility::Local7)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_priority(self.priority)
    }

    /// PROCID as a process id, when the sender used a numeric one.
    pub fn pid(&self) -> Option<i32> {
        self.proc_id.as_deref().and_then(|s| s.parse().ok())
    }
}

fn nil_or(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Renders the message back in RFC 5424 layout, with SD values re-escaped.
impl fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>{} ", self.priority, self.version)?;
        match &self.timestamp {
            Some(ts) => write!(f, "{}", ts.to_rfc3339())?,
            None => f.write_str("-")?,
        }
        write!(
            f,
            " {} {} {} {} ",
            nil_or(&self.hostname),
            nil_or(&self.app_name),
            nil_or(&self.proc_id),
            nil_or(&self.msg_id)
        )?;

        if self.structured_data.is_empty() {
            f.write_str("-")?;
        }
        for element in &self.structured_data {
            write!(f, "[{}", element.id)?;
            for (key, value) in &element.params {
                write!(f, " {}=\"", key)?;
                for ch in value.chars() {
                    if matches!(ch, '"' | '\\' | ']') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", ch)?;
                }
                f.write_str("\"")?;
            }
            f.write_str("]")?;
        }

        if !self.msg.is_empty() {
            write!(f, " {}", self.msg)?;
        }

        Ok(())
    }
}

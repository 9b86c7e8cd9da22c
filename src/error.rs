use thiserror::Error;

/// Why a timestamp token was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Reason {
    #[error("input is too short")]
    TooShort,
    #[error("invalid character in date")]
    InvalidCharDate,
    #[error("invalid date/time separator")]
    InvalidCharDateTimeSep,
    #[error("invalid character in time")]
    InvalidCharTime,
    #[error("month value is outside expected range of 1-12")]
    OutOfRangeMonth,
    #[error("day value is outside expected range")]
    OutOfRangeDay,
    #[error("hour value is outside expected range of 0-23")]
    OutOfRangeHour,
    #[error("minute value is outside expected range of 0-59")]
    OutOfRangeMinute,
    #[error("second value is outside expected range of 0-59")]
    OutOfRangeSecond,
    #[error("fractional seconds have no digits")]
    SecondFractionMissing,
    #[error("missing UTC offset")]
    MissingOffset,
    #[error("invalid timezone sign")]
    InvalidCharTzSign,
    #[error("invalid timezone hour")]
    InvalidCharTzHour,
    #[error("invalid timezone minute")]
    InvalidCharTzMinute,
    #[error("timezone offset is out of range")]
    OutOfRangeTimezone,
    #[error("unexpected extra characters")]
    ExtraCharacters,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("malformed timestamp {token:?}: {reason}")]
    Malformed { token: String, reason: Reason },
}

impl TimestampError {
    pub(crate) fn malformed(token: &str, reason: Reason) -> Self {
        TimestampError::Malformed {
            token: token.to_owned(),
            reason,
        }
    }

    /// The raw token that failed to parse.
    pub fn token(&self) -> &str {
        match self {
            TimestampError::Malformed { token, .. } => token,
        }
    }
}

/// Structured data errors. Offsets are byte positions in the decoded input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StructuredDataError {
    #[error("unterminated param value starting at offset {offset}")]
    UnterminatedValue { offset: usize },
    #[error("unbalanced bracket at offset {offset}")]
    UnbalancedBracket { offset: usize },
    #[error("invalid param at offset {offset}")]
    InvalidParam { offset: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),
    #[error("incomplete header: {0}")]
    IncompleteHeader(&'static str),
    #[error("unsupported version {0:?}")]
    UnsupportedVersion(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] TimestampError),
    #[error("invalid structured data: {0}")]
    StructuredData(#[from] StructuredDataError),
    #[error("unicode error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Transport framing failures. These end the connection they occur on.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds the limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
    #[error("invalid octet count prefix")]
    InvalidLength,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing failed: {0}")]
    Frame(FrameError),
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => ConnectionError::Io(err),
            err => ConnectionError::Frame(err),
        }
    }
}

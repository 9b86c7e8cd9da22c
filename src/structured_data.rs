//! STRUCTURED-DATA parsing, see RFC 5424 section 6.3.

use crate::error::StructuredDataError;

/// One `[id key="value" ...]` element.
///
/// Params keep the order they first appeared in. Equality ignores that
/// order.
#[derive(Clone, Debug, Eq)]
pub struct StructuredElement {
    pub id: String,
    pub params: Vec<(String, String)>,
}

impl StructuredElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: Vec::new(),
        }
    }

    /// Look up a param value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert a param, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: String, value: String) {
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((key, value)),
        }
    }
}

impl PartialEq for StructuredElement {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id || self.params.len() != other.params.len() {
            return false;
        }

        let mut params1 = self.params.iter().collect::<Vec<_>>();
        params1.sort();

        let mut params2 = other.params.iter().collect::<Vec<_>>();
        params2.sort();

        params1 == params2
    }
}

/// What to do when the same SD-ID shows up in more than one element of a
/// single message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateIds {
    /// Keep every element as its own entry.
    #[default]
    Preserve,
    /// Fold the params into the first element with that ID, later values
    /// overwrite earlier ones.
    Merge,
}

/// Parse the structured data elements starting at `offset` in `input`.
///
/// `input[offset..]` must start with `[`; the NILVALUE `-` is the caller's
/// business. Returns the elements and the offset of the first character
/// after the last `]`.
pub fn parse_structured_data(
    input: &str,
    offset: usize,
) -> Result<(Vec<StructuredElement>, usize), StructuredDataError> {
    parse_structured_data_with(input, offset, DuplicateIds::Preserve)
}

/// Same as [`parse_structured_data`] with an explicit duplicate ID policy.
pub fn parse_structured_data_with(
    input: &str,
    offset: usize,
    duplicates: DuplicateIds,
) -> Result<(Vec<StructuredElement>, usize), StructuredDataError> {
    let buf = input.as_bytes();
    let mut offset = offset;
    // 4 is RawVec::MIN_NON_ZERO_CAP
    let mut elements: Vec<StructuredElement> = Vec::with_capacity(4);

    loop {
        let element = parse_element(input, &mut offset)?;

        match duplicates {
            DuplicateIds::Merge => {
                match elements.iter_mut().find(|existing| existing.id == element.id) {
                    Some(existing) => {
                        for (key, value) in element.params {
                            existing.insert(key, value);
                        }
                    }
                    None => elements.push(element),
                }
            }
            DuplicateIds::Preserve => elements.push(element),
        }

        match buf.get(offset) {
            Some(b'[') => continue,
            Some(b']') => return Err(StructuredDataError::UnbalancedBracket { offset }),
            _ => break,
        }
    }

    Ok((elements, offset))
}

#[inline]
fn is_name_char(ch: u8) -> bool {
    !matches!(ch, b' ' | b']' | b'=' | b'"')
}

// Take a run of SD-NAME characters. Multi-byte UTF-8 sequences never contain
// the ASCII delimiters, so slicing at a delimiter stays on a char boundary.
#[inline]
fn take_name<'a>(input: &'a str, offset: &mut usize) -> &'a str {
    let buf = input.as_bytes();
    let start = *offset;
    let mut pos = start;
    while pos < buf.len() && is_name_char(buf[pos]) {
        pos += 1;
    }

    *offset = pos;
    &input[start..pos]
}

#[inline]
fn skip_spaces(buf: &[u8], offset: &mut usize) {
    while buf.get(*offset) == Some(&b' ') {
        *offset += 1;
    }
}

// example: [exampleSDID@32473 iut="3" eventSource="Application" eventID="1011"]
fn parse_element(
    input: &str,
    offset: &mut usize,
) -> Result<StructuredElement, StructuredDataError> {
    let buf = input.as_bytes();
    if buf.get(*offset) != Some(&b'[') {
        return Err(StructuredDataError::UnbalancedBracket { offset: *offset });
    }
    *offset += 1;

    let mut element = StructuredElement::new(take_name(input, offset));

    loop {
        skip_spaces(buf, offset);

        let ch = match buf.get(*offset) {
            Some(ch) => *ch,
            // element was never closed
            None => return Err(StructuredDataError::UnbalancedBracket { offset: *offset }),
        };

        if ch == b']' {
            *offset += 1;
            return Ok(element);
        }

        let key_start = *offset;
        let key = take_name(input, offset);
        if key.is_empty() {
            return Err(StructuredDataError::InvalidParam { offset: key_start });
        }

        match buf.get(*offset) {
            Some(b'=') => *offset += 1,
            Some(b']') => return Err(StructuredDataError::UnbalancedBracket { offset: *offset }),
            None => return Err(StructuredDataError::UnbalancedBracket { offset: *offset }),
            Some(_) => return Err(StructuredDataError::InvalidParam { offset: *offset }),
        }

        let value = parse_param_value(input, offset)?;
        element.insert(key.to_owned(), value);

        match buf.get(*offset) {
            Some(b' ') | Some(b']') => {}
            None => return Err(StructuredDataError::UnbalancedBracket { offset: *offset }),
            Some(_) => return Err(StructuredDataError::InvalidParam { offset: *offset }),
        }
    }
}

/// Parse a quoted `PARAM-VALUE`, unescaping `\"`, `\\` and `\]`.
///
/// A backslash in front of any other character is kept as is.
fn parse_param_value(input: &str, offset: &mut usize) -> Result<String, StructuredDataError> {
    let start = *offset;
    match input.as_bytes().get(start) {
        Some(b'"') => {}
        Some(b']') | None => return Err(StructuredDataError::UnbalancedBracket { offset: start }),
        Some(_) => return Err(StructuredDataError::InvalidParam { offset: start }),
    }

    let mut value = String::new();
    let mut escaped = false;
    for (index, ch) in input[start + 1..].char_indices() {
        if escaped {
            if !matches!(ch, '"' | '\\' | ']') {
                value.push('\\');
            }
            value.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '"' => {
                // 1 for the opening quote, 1 for the closing one
                *offset = start + 1 + index + 1;
                return Ok(value);
            }
            _ => value.push(ch),
        }
    }

    Err(StructuredDataError::UnterminatedValue { offset: start })
}

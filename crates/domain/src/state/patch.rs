//! In-place patcher for flat `{"key":value,...}` status text.
//!
//! The text is scanned once into key/value byte spans. Values are kept as raw
//! spans, so a nested value such as `"Wifi":{...}` is carried and replaced as
//! a whole but never descended into. Merging splices new value text into the
//! existing buffer and shifts the recorded spans of every later property by
//! the length delta, so no document model is ever built.

use std::ops::Range;

use crate::error::PatchError;

/// Byte spans of one top-level property.
///
/// `key` excludes the surrounding quotes, `value` is the raw value text
/// (quotes included for strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Property {
    pub key: Range<usize>,
    pub value: Range<usize>,
}

/// Which patch properties a merge applied and which it skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Keys whose value text changed.
    pub replaced: Vec<String>,
    /// Keys present in the patch but missing from the state.
    pub absent: Vec<String>,
}

impl MergeOutcome {
    /// `true` when at least one value was rewritten.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.replaced.is_empty()
    }
}

/// Split `text` into its top-level properties.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Property>, PatchError> {
    Scanner::new(text).object()
}

/// Return the value of `key` in `text`, compared case-insensitively.
///
/// String values are returned without their quotes; anything else is returned
/// as its raw text.
///
/// # Errors
///
/// Returns [`PatchError::Malformed`] if `text` is not a flat object.
pub fn extract<'a>(text: &'a str, key: &str) -> Result<Option<&'a str>, PatchError> {
    let properties = tokenize(text)?;
    Ok(properties
        .iter()
        .find(|property| text[property.key.clone()].eq_ignore_ascii_case(key))
        .map(|property| unquote(&text[property.value.clone()])))
}

/// Merge every property of `patch` into `state` without rebuilding it.
///
/// Properties are matched case-insensitively anywhere in `state`; a property
/// that `state` lacks is reported in [`MergeOutcome::absent`] and skipped.
/// When `patch` repeats a key, the last occurrence wins. All replacements are
/// planned first, so on error `state` is left untouched.
///
/// # Errors
///
/// - [`PatchError::Malformed`] if either text is not a flat object.
/// - [`PatchError::CapacityExceeded`] if the merged text would be longer than
///   `capacity` bytes.
pub fn merge_in_place(
    state: &mut String,
    capacity: usize,
    patch: &str,
) -> Result<MergeOutcome, PatchError> {
    let mut properties = tokenize(state)?;
    let incoming = tokenize(patch)?;

    let mut outcome = MergeOutcome::default();
    let mut edits: Vec<(usize, &str)> = Vec::new();
    for property in &incoming {
        let key = &patch[property.key.clone()];
        let value = &patch[property.value.clone()];
        let Some(index) = properties
            .iter()
            .position(|existing| state[existing.key.clone()].eq_ignore_ascii_case(key))
        else {
            outcome.absent.push(key.to_string());
            continue;
        };
        match edits.iter_mut().find(|(existing, _)| *existing == index) {
            Some(edit) => edit.1 = value,
            None => edits.push((index, value)),
        }
    }
    edits.retain(|(index, value)| state[properties[*index].value.clone()] != **value);

    let required = edits.iter().fold(state.len(), |len, (index, value)| {
        len + value.len() - properties[*index].value.len()
    });
    if required > capacity {
        return Err(PatchError::CapacityExceeded { required, capacity });
    }

    edits.sort_by_key(|(index, _)| properties[*index].value.start);
    for (index, value) in edits {
        let span = properties[index].value.clone();
        state.replace_range(span.clone(), value);
        shift_after(&mut properties, span.start, span.len(), value.len());
        properties[index].value = span.start..span.start + value.len();
        outcome
            .replaced
            .push(state[properties[index].key.clone()].to_string());
    }

    Ok(outcome)
}

/// Move every span that starts after `at` by `new_len - old_len`.
fn shift_after(properties: &mut [Property], at: usize, old_len: usize, new_len: usize) {
    let shift = |range: &mut Range<usize>| {
        *range = range.start + new_len - old_len..range.end + new_len - old_len;
    };
    for property in properties.iter_mut().filter(|p| p.key.start > at) {
        shift(&mut property.key);
        shift(&mut property.value);
    }
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(raw)
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn malformed(&self) -> PatchError {
        PatchError::Malformed { offset: self.pos }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), PatchError> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.malformed())
        }
    }

    fn object(mut self) -> Result<Vec<Property>, PatchError> {
        let mut properties = Vec::new();
        self.expect(b'{')?;
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
        } else {
            loop {
                self.skip_whitespace();
                let key = self.string()?;
                self.expect(b':')?;
                self.skip_whitespace();
                let value = self.value()?;
                properties.push(Property {
                    key: key.start + 1..key.end - 1,
                    value,
                });
                self.skip_whitespace();
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b'}') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.malformed()),
                }
            }
        }
        self.skip_whitespace();
        if self.pos == self.bytes.len() {
            Ok(properties)
        } else {
            Err(self.malformed())
        }
    }

    /// Scan a quoted string, returning its span including the quotes.
    fn string(&mut self) -> Result<Range<usize>, PatchError> {
        let start = self.pos;
        if self.peek() != Some(b'"') {
            return Err(self.malformed());
        }
        self.pos += 1;
        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'\\' => self.pos += 1,
                b'"' => return Ok(start..self.pos),
                _ => {}
            }
        }
        Err(PatchError::Malformed { offset: start })
    }

    fn value(&mut self) -> Result<Range<usize>, PatchError> {
        match self.peek() {
            Some(b'"') => self.string(),
            Some(b'{' | b'[') => self.nested(),
            Some(_) => self.scalar(),
            None => Err(self.malformed()),
        }
    }

    /// Skip a balanced object or array, honouring strings inside it.
    fn nested(&mut self) -> Result<Range<usize>, PatchError> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(byte) = self.peek() {
            match byte {
                b'"' => {
                    self.string()?;
                    continue;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(start..self.pos);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(PatchError::Malformed { offset: start })
    }

    /// Numbers, booleans, and null: everything up to the next delimiter.
    fn scalar(&mut self) -> Result<Range<usize>, PatchError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !matches!(b, b',' | b'}' | b']' | b'{' | b'[' | b'"') && !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if self.pos == start {
            Err(self.malformed())
        } else {
            Ok(start..self.pos)
        }
    }
}

//! Incremental decoder for very large JSON documents.
//!
//! Elements are handed to a callback one at a time as soon as their bytes
//! have been read. Memory use is one element plus the reader's buffer,
//! whatever the length of the array.

use std::fmt;
use std::io::BufRead;
use std::ops::ControlFlow;

use serde::de::{Deserializer as _, SeqAccess, Visitor};
use serde_json::Value;

use super::format::{InputFormat, describe_leading, peek_significant};
use crate::error::DecodeError;
use crate::record::DecodedRecord;

/// Forward-only decoder over a byte stream.
pub struct StreamDecoder<R> {
    reader: R,
    format: InputFormat,
}

impl<R: BufRead> StreamDecoder<R> {
    pub fn new(reader: R, format: InputFormat) -> Self {
        Self { reader, format }
    }

    /// Decode every element, handing each to `on_record`.
    ///
    /// Stops early when the callback returns `Break`. Returns the number of
    /// elements handed out. On error, elements already handed out stay valid
    /// and the error records how many there were.
    pub fn decode<F>(mut self, mut on_record: F) -> Result<u64, DecodeError>
    where
        F: FnMut(DecodedRecord) -> ControlFlow<()>,
    {
        let first = peek_significant(&mut self.reader)
            .map_err(|source| DecodeError::Read { records: 0, source })?;

        match self.format.resolve(first) {
            InputFormat::Lines => decode_lines(self.reader, &mut on_record),
            _ if first != Some(b'[') => Err(DecodeError::NotAnArray {
                found: describe_leading(first),
            }),
            _ => decode_array(self.reader, &mut on_record),
        }
    }
}

fn decode_array<R, F>(reader: R, on_record: &mut F) -> Result<u64, DecodeError>
where
    R: BufRead,
    F: FnMut(DecodedRecord) -> ControlFlow<()>,
{
    let mut de = serde_json::Deserializer::from_reader(reader);
    let mut yielded = 0u64;
    let mut stopped = false;

    let result = (&mut de).deserialize_seq(ArrayVisitor {
        on_record,
        yielded: &mut yielded,
        stopped: &mut stopped,
    });

    // The closing bracket is never reached after an early stop, so the
    // deserializer's complaint about it is expected.
    if stopped {
        return Ok(yielded);
    }
    result.map_err(|e| DecodeError::from_json(e, yielded))?;

    // Anything after the closing bracket other than whitespace is malformed
    de.end().map_err(|e| DecodeError::from_json(e, yielded))?;
    Ok(yielded)
}

fn decode_lines<R, F>(reader: R, on_record: &mut F) -> Result<u64, DecodeError>
where
    R: BufRead,
    F: FnMut(DecodedRecord) -> ControlFlow<()>,
{
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<Value>();
    let mut yielded = 0u64;

    for item in stream {
        let value = item.map_err(|e| DecodeError::from_json(e, yielded))?;
        let index = yielded;
        yielded += 1;
        if on_record(DecodedRecord { index, value }).is_break() {
            break;
        }
    }
    Ok(yielded)
}

struct ArrayVisitor<'a, F> {
    on_record: &'a mut F,
    yielded: &'a mut u64,
    stopped: &'a mut bool,
}

impl<'de, F> Visitor<'de> for ArrayVisitor<'_, F>
where
    F: FnMut(DecodedRecord) -> ControlFlow<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(value) = seq.next_element::<Value>()? {
            let index = *self.yielded;
            *self.yielded += 1;
            if (self.on_record)(DecodedRecord { index, value }).is_break() {
                *self.stopped = true;
                return Ok(());
            }
        }
        Ok(())
    }
}

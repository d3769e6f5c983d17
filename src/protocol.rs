//! Typed message envelopes exchanged between ranks.
//!
//! Every message on the wire is a bincode encoded [`Envelope`] carrying the
//! sender's rank, the element count it claims to carry and the payload
//! itself. The count is checked against the payload when a frame is
//! decoded, and receivers check the payload kind and size against what
//! they were told to expect, so a malformed or out-of-order message is
//! rejected instead of being trusted.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::{Error, Result};

/// Kind of a payload, used when reporting protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Tag {
    Dimension,
    Vector,
    SliceHeader,
    RowOffsets,
    ColumnIndices,
    Values,
    RowCount,
    LocalResult,
    Token,
    Abort,
}

/// Metadata announcing one rank's slice of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceHeader {
    pub first_row: usize,
    pub row_count: usize,
    pub local_nnz: usize,
    pub ncols: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Dimension(usize),
    Vector(Vec<f64>),
    SliceHeader(SliceHeader),
    RowOffsets(Vec<usize>),
    ColumnIndices(Vec<usize>),
    Values(Vec<f64>),
    RowCount(usize),
    LocalResult(Vec<f64>),
    Token,
    Abort(String),
}

impl Payload {
    pub fn tag(&self) -> Tag {
        match self {
            Payload::Dimension(_) => Tag::Dimension,
            Payload::Vector(_) => Tag::Vector,
            Payload::SliceHeader(_) => Tag::SliceHeader,
            Payload::RowOffsets(_) => Tag::RowOffsets,
            Payload::ColumnIndices(_) => Tag::ColumnIndices,
            Payload::Values(_) => Tag::Values,
            Payload::RowCount(_) => Tag::RowCount,
            Payload::LocalResult(_) => Tag::LocalResult,
            Payload::Token => Tag::Token,
            Payload::Abort(_) => Tag::Abort,
        }
    }

    /// Number of elements carried. Scalars and markers count as one.
    pub fn len(&self) -> usize {
        match self {
            Payload::Vector(v) | Payload::Values(v) | Payload::LocalResult(v) => v.len(),
            Payload::RowOffsets(v) | Payload::ColumnIndices(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: usize,
    pub len: usize,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(source: usize, payload: Payload) -> Self {
        Self {
            source,
            len: payload.len(),
            payload,
        }
    }

    pub fn tag(&self) -> Tag {
        self.payload.tag()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a frame and checks the declared length against the payload.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let envelope: Envelope = bincode::deserialize(frame)?;
        if envelope.len != envelope.payload.len() {
            return Err(Error::protocol(
                envelope.source,
                format!(
                    "{} envelope declares {} elements but carries {}",
                    envelope.tag(),
                    envelope.len,
                    envelope.payload.len()
                ),
            ));
        }
        Ok(envelope)
    }

    fn unexpected(&self, wanted: Tag) -> Error {
        Error::protocol(
            self.source,
            format!("expected {wanted} message, received {}", self.tag()),
        )
    }

    fn check_len(&self, wanted: Tag, expected: Option<usize>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.len => Err(Error::protocol(
                self.source,
                format!(
                    "{wanted} message carries {} elements, {expected} were declared",
                    self.len
                ),
            )),
            _ => Ok(()),
        }
    }

    pub fn into_dimension(self) -> Result<usize> {
        match self.payload {
            Payload::Dimension(n) => Ok(n),
            _ => Err(self.unexpected(Tag::Dimension)),
        }
    }

    pub fn into_vector(self, expected: Option<usize>) -> Result<Vec<f64>> {
        self.check_len(Tag::Vector, expected)?;
        match self.payload {
            Payload::Vector(v) => Ok(v),
            _ => Err(self.unexpected(Tag::Vector)),
        }
    }

    pub fn into_slice_header(self) -> Result<SliceHeader> {
        match self.payload {
            Payload::SliceHeader(header) => Ok(header),
            _ => Err(self.unexpected(Tag::SliceHeader)),
        }
    }

    pub fn into_row_offsets(self, expected: usize) -> Result<Vec<usize>> {
        self.check_len(Tag::RowOffsets, Some(expected))?;
        match self.payload {
            Payload::RowOffsets(v) => Ok(v),
            _ => Err(self.unexpected(Tag::RowOffsets)),
        }
    }

    pub fn into_column_indices(self, expected: usize) -> Result<Vec<usize>> {
        self.check_len(Tag::ColumnIndices, Some(expected))?;
        match self.payload {
            Payload::ColumnIndices(v) => Ok(v),
            _ => Err(self.unexpected(Tag::ColumnIndices)),
        }
    }

    pub fn into_values(self, expected: usize) -> Result<Vec<f64>> {
        self.check_len(Tag::Values, Some(expected))?;
        match self.payload {
            Payload::Values(v) => Ok(v),
            _ => Err(self.unexpected(Tag::Values)),
        }
    }

    pub fn into_row_count(self) -> Result<usize> {
        match self.payload {
            Payload::RowCount(count) => Ok(count),
            _ => Err(self.unexpected(Tag::RowCount)),
        }
    }

    pub fn into_local_result(self, expected: usize) -> Result<Vec<f64>> {
        self.check_len(Tag::LocalResult, Some(expected))?;
        match self.payload {
            Payload::LocalResult(v) => Ok(v),
            _ => Err(self.unexpected(Tag::LocalResult)),
        }
    }

    pub fn into_token(self) -> Result<()> {
        match self.payload {
            Payload::Token => Ok(()),
            _ => Err(self.unexpected(Tag::Token)),
        }
    }
}

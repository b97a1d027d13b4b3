//! Python-pickle encoder — C7.
//!
//! Emits the exact opcode subset spec.md §4.7 calls out (pickle
//! protocol 2's basic opcodes, no `PROTO` header — this matches how
//! `original_source/backend/render.go`'s `Pickler` writes directly
//! against a `bufio.Writer` with no declared-protocol preamble, which
//! every reference Graphite pickle unpickler still accepts). Pull-based:
//! the caller drives one [`Pickler::write_series`] call per metric group
//! so a single per-request buffer is all the memory this needs.

use std::io::{self, Write};

use crate::align::{AlignedSeries, AlignedValue};

const MARK: u8 = b'(';
const STOP: u8 = b'.';
const EMPTY_LIST: u8 = b']';
const APPENDS: u8 = b'e';
const EMPTY_DICT: u8 = b'}';
const SETITEMS: u8 = b'u';
const SHORT_BINSTRING: u8 = b'U';
const BINUNICODE: u8 = b'X';
const BININT1: u8 = b'K';
const BININT2: u8 = b'M';
const BININT: u8 = b'J';
const BINFLOAT: u8 = b'G';
const NONE: u8 = b'N';

/// Pre-serialized empty list (`[]`), returned verbatim when a render
/// request's finder matched no series.
pub const EMPTY_PICKLED_LIST: &[u8] = &[EMPTY_LIST, STOP];

/// A pull-based pickle writer over `W`.
pub struct Pickler<W: Write> {
    w: W,
}

impl<W: Write> Pickler<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    /// Opens the outer list of per-series dictionaries.
    pub fn begin_list(&mut self) -> io::Result<()> {
        self.w.write_all(&[EMPTY_LIST, MARK])
    }

    /// Closes the outer list and terminates the stream.
    pub fn end_list(&mut self) -> io::Result<()> {
        self.w.write_all(&[APPENDS, STOP])
    }

    /// Writes one `{name, step, values, start, end}` dictionary.
    pub fn write_series(&mut self, name: &str, aligned: &AlignedSeries) -> io::Result<()> {
        self.w.write_all(&[EMPTY_DICT, MARK])?;

        self.write_string("name")?;
        self.write_string(name)?;

        self.write_string("step")?;
        self.write_uint32(aligned.step as u32)?;

        self.write_string("values")?;
        self.w.write_all(&[EMPTY_LIST, MARK])?;
        for value in &aligned.values {
            match value {
                AlignedValue::Value(v) => self.write_float(*v)?,
                AlignedValue::Null => self.write_none()?,
            }
        }
        self.w.write_all(&[APPENDS])?;

        self.write_string("start")?;
        self.write_uint32(aligned.start as u32)?;

        self.write_string("end")?;
        self.write_uint32(aligned.end as u32)?;

        self.w.write_all(&[SETITEMS])
    }

    fn write_uint32(&mut self, v: u32) -> io::Result<()> {
        if v <= 0xFF {
            self.w.write_all(&[BININT1, v as u8])
        } else if v <= 0xFFFF {
            self.w.write_all(&[BININT2])?;
            self.w.write_all(&(v as u16).to_le_bytes())
        } else {
            self.w.write_all(&[BININT])?;
            self.w.write_all(&v.to_le_bytes())
        }
    }

    fn write_string(&mut self, s: &str) -> io::Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() <= 255 {
            self.w.write_all(&[SHORT_BINSTRING, bytes.len() as u8])?;
            self.w.write_all(bytes)
        } else {
            self.w.write_all(&[BINUNICODE])?;
            self.w.write_all(&(bytes.len() as u32).to_le_bytes())?;
            self.w.write_all(bytes)
        }
    }

    fn write_float(&mut self, v: f64) -> io::Result<()> {
        self.w.write_all(&[BINFLOAT])?;
        self.w.write_all(&v.to_be_bytes())
    }

    fn write_none(&mut self) -> io::Result<()> {
        self.w.write_all(&[NONE])
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

/// Encodes a full render response: an empty series list short-circuits
/// to [`EMPTY_PICKLED_LIST`]; otherwise one dict per `(name, series)`.
pub fn encode<'a, W: Write>(
    w: W,
    series: impl Iterator<Item = (&'a str, &'a AlignedSeries)>,
) -> io::Result<W> {
    let mut series = series.peekable();
    if series.peek().is_none() {
        let mut w = w;
        w.write_all(EMPTY_PICKLED_LIST)?;
        return Ok(w);
    }

    let mut pickler = Pickler::new(w);
    pickler.begin_list()?;
    for (name, aligned) in series {
        pickler.write_series(name, aligned)?;
    }
    pickler.end_list()?;
    Ok(pickler.into_inner())
}

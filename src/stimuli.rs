// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Stimulus file parsing
//!
//! Instruction streams for the encoder come out of RTL simulations in one of
//! two text formats: whitespace-delimited `key= value` records, one
//! instruction per line, or CSV with a fixed header. Addresses, instruction
//! words, cause, tval and privilege are hexadecimal, booleans are decimal.

use core::fmt;

use alloc::vec::Vec;

use crate::types::{Instr, Privilege};

/// The CSV header accepted by [`parse_csv`]
pub const CSV_HEADER: &str = "VALID,ADDRESS,INSN,PRIVILEGE,EXCEPTION,ECAUSE,TVAL,INTERRUPT";

/// Parse a `key= value` stimulus file
///
/// Expected keys, in order: `valid= exception= interrupt= cause= tval= priv=
/// compressed= addr= instr=`. Whitespace between a key and its value is
/// optional.
pub fn parse_stimuli(input: &str) -> Result<Vec<Instr>, Error> {
    let mut records = Vec::new();
    let mut fields = Fields::new(input);
    loop {
        let Some(valid) = fields.next_opt("valid")? else {
            return Ok(records);
        };
        let record = Instr {
            valid,
            exception: fields.next_bool("exception")?,
            interrupt: fields.next_bool("interrupt")?,
            cause: fields.next_hex("cause")? as u8,
            tval: fields.next_hex("tval")?,
            privilege: Privilege::new(fields.next_hex("priv")? as u8),
            compressed: fields.next_bool("compressed")?,
            iaddr: fields.next_hex("addr")?,
            instr: fields.next_hex("instr")?,
        };
        records.push(record);
    }
}

/// Parse a CSV stimulus file
///
/// The first line must match [`CSV_HEADER`]. The `compressed` flag is
/// derived from the instruction word.
pub fn parse_csv(input: &str) -> Result<Vec<Instr>, Error> {
    let mut lines = input.lines();
    let header = lines.next().map(str::trim).unwrap_or_default();
    if header != CSV_HEADER {
        return Err(Error::BadCsvHeader);
    }

    let mut records = Vec::new();
    for (number, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut columns = line.split(',').map(str::trim);
        let mut next = |key| {
            columns
                .next()
                .filter(|c| !c.is_empty())
                .ok_or(Error::MissingColumns(number + 2))
                .map(|v| (key, v))
        };

        let valid = bool_field(next("valid")?)?;
        let iaddr = hex_field(next("address")?)?;
        let instr = hex_field(next("insn")?)?;
        let privilege = Privilege::new(hex_field(next("privilege")?)? as u8);
        let exception = bool_field(next("exception")?)?;
        let cause = hex_field(next("ecause")?)? as u8;
        let tval = hex_field(next("tval")?)?;
        let interrupt = bool_field(next("interrupt")?)?;
        if columns.next().is_some() {
            return Err(Error::ExcessColumns(number + 2));
        }

        records.push(Instr {
            valid,
            exception,
            interrupt,
            cause,
            tval,
            privilege,
            iaddr,
            instr,
            compressed: (instr & 0b11) != 0b11,
        });
    }
    Ok(records)
}

/// Tokenizer over `key= value` fields
struct Fields<'i> {
    tokens: core::str::SplitWhitespace<'i>,
}

impl<'i> Fields<'i> {
    fn new(input: &'i str) -> Self {
        Self {
            tokens: input.split_whitespace(),
        }
    }

    /// Retrieve the next field, expecting the given key
    ///
    /// Returns [`None`] at the end of the input, but only on a record
    /// boundary.
    fn next_raw(&mut self, key: &'static str) -> Result<Option<(&'static str, &'i str)>, Error> {
        let Some(token) = self.tokens.next() else {
            return Ok(None);
        };
        let (name, value) = token.split_once('=').ok_or(Error::MalformedField(key))?;
        if name != key {
            return Err(Error::MalformedField(key));
        }
        let value = if value.is_empty() {
            // `key= value` with the value in the next token
            self.tokens.next().ok_or(Error::MalformedField(key))?
        } else {
            value
        };
        Ok(Some((key, value)))
    }

    fn next_opt(&mut self, key: &'static str) -> Result<Option<bool>, Error> {
        self.next_raw(key)?.map(bool_field).transpose()
    }

    fn next_bool(&mut self, key: &'static str) -> Result<bool, Error> {
        self.next_raw(key)?
            .ok_or(Error::MalformedField(key))
            .and_then(bool_field)
    }

    fn next_hex(&mut self, key: &'static str) -> Result<u64, Error> {
        self.next_raw(key)?
            .ok_or(Error::MalformedField(key))
            .and_then(hex_field)
    }
}

fn bool_field((key, value): (&'static str, &str)) -> Result<bool, Error> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(Error::MalformedField(key)),
    }
}

fn hex_field((key, value): (&'static str, &str)) -> Result<u64, Error> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(value, 16).map_err(|_| Error::MalformedField(key))
}

/// Stimulus parsing errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The CSV header line does not match [`CSV_HEADER`]
    BadCsvHeader,
    /// A field is missing, misnamed or holds an unparsable value
    MalformedField(&'static str),
    /// A CSV line (1-based) holds too few columns
    MissingColumns(usize),
    /// A CSV line (1-based) holds too many columns
    ExcessColumns(usize),
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadCsvHeader => write!(f, "bad CSV header line"),
            Self::MalformedField(key) => write!(f, "malformed field \"{key}\""),
            Self::MissingColumns(line) => write!(f, "too few columns on line {line}"),
            Self::ExcessColumns(line) => write!(f, "too many columns on line {line}"),
        }
    }
}

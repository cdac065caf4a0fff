//! Binary compiled-template persistence (C11): `SaveToFile`/`CreateFromFile`
//! round-trip the resolved token vector; `DumpToFile` writes a
//! human-readable listing for debugging. Format per SPEC_FULL.md §6: a
//! flat concatenation of tokens, each `1-byte kind, length-prefixed
//! value1, length-prefixed value2, 8-byte LE ref1, 8-byte LE ref2`, no
//! header, no checksum, reading stops at the first `EOF`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::DumpError;
use crate::token::{Kind, Token};

fn write_string(w: &mut impl Write, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_string(r: &mut impl Read) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_token(w: &mut impl Write, token: &Token) -> io::Result<()> {
    w.write_all(&[token.kind as u8])?;
    write_string(w, &token.value1)?;
    write_string(w, &token.value2)?;
    w.write_all(&token.ref1.to_le_bytes())?;
    w.write_all(&token.ref2.to_le_bytes())?;
    Ok(())
}

fn read_token(r: &mut impl Read) -> Result<Token, DumpError> {
    let mut kind_buf = [0u8; 1];
    r.read_exact(&mut kind_buf)?;
    let kind = Kind::from_byte(kind_buf[0]).ok_or_else(|| DumpError::Corrupt(format!("unknown kind byte {}", kind_buf[0])))?;
    let value1 = read_string(r)?;
    let value2 = read_string(r)?;
    let mut ref1_buf = [0u8; 8];
    r.read_exact(&mut ref1_buf)?;
    let mut ref2_buf = [0u8; 8];
    r.read_exact(&mut ref2_buf)?;
    Ok(Token { kind, value1, value2, ref1: i64::from_le_bytes(ref1_buf), ref2: i64::from_le_bytes(ref2_buf) })
}

/// Serialize `tokens` to `path`, stopping after (and including) the
/// first `EOF` token.
pub fn save_to_file(tokens: &[Token], path: impl AsRef<Path>) -> Result<(), DumpError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for token in tokens {
        write_token(&mut writer, token)?;
        if token.kind == Kind::Eof {
            break;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Deserialize a token vector previously written by [`save_to_file`]. A
/// file that ends before an `EOF` token (or with trailing garbage that
/// doesn't parse as one) is corrupt.
pub fn create_from_file(path: impl AsRef<Path>) -> Result<Vec<Token>, DumpError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut tokens = Vec::new();
    loop {
        let token = read_token(&mut reader)?;
        let is_eof = token.kind == Kind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

/// Write a human-readable listing of `tokens`, one line per token, for
/// debugging. Not meant to be machine-parsed.
pub fn dump_to_file(tokens: &[Token], path: impl AsRef<Path>) -> Result<(), DumpError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (idx, token) in tokens.iter().enumerate() {
        writeln!(
            writer,
            "{idx:>5} {:<15} value1={:?} value2={:?} ref1={} ref2={}",
            format!("{:?}", token.kind),
            token.value1,
            token.value2,
            token.ref1,
            token.ref2
        )?;
        if token.kind == Kind::Eof {
            break;
        }
    }
    writer.flush()?;
    Ok(())
}

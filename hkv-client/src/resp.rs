//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and parse server replies straight out of
//! the connection's read buffer.
//!
//! ## Design Principles
//! 1. **Incremental Parsing**: An incomplete frame yields `Ok(None)` and leaves
//!    the buffer untouched so the caller can read more and retry.
//! 2. **Buffer Reuse**: Callers own the `BytesMut` buffers.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use bytes::{Buf, BufMut, BytesMut};

use hkv_common::{CacheError, CacheResult};

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays, with None for a null array.
    Array(Option<Vec<RespValue>>),
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut BytesMut) {
    out.put_u8(b'*');
    push_usize(out, args.len());
    out.put_slice(b"\r\n");
    for arg in args {
        out.put_u8(b'$');
        push_usize(out, arg.len());
        out.put_slice(b"\r\n");
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
}

/// Parses one reply from the front of `buf`.
///
/// On success the frame is consumed. Returns `Ok(None)` when `buf` does not
/// yet hold a complete frame.
pub fn parse_response(buf: &mut BytesMut) -> CacheResult<Option<RespValue>> {
    match parse_at(buf, 0)? {
        Some((value, end)) => {
            buf.advance(end);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse_at(buf: &[u8], pos: usize) -> CacheResult<Option<(RespValue, usize)>> {
    let Some(line_end) = find_line_end(buf, pos)? else {
        return Ok(None);
    };
    if line_end == pos {
        return Err(CacheError::Protocol("empty reply line"));
    }
    let line = &buf[pos + 1..line_end];
    let next = line_end + 2;

    match buf[pos] {
        b'+' => Ok(Some((RespValue::Simple(line.to_vec()), next))),
        b'-' => Ok(Some((RespValue::Error(line.to_vec()), next))),
        b':' => Ok(Some((RespValue::Integer(parse_i64(line)?), next))),
        b'$' => parse_bulk(buf, parse_i64(line)?, next),
        b'*' => parse_array(buf, parse_i64(line)?, next),
        _ => Err(CacheError::Protocol("unknown reply type")),
    }
}

fn parse_bulk(buf: &[u8], len: i64, start: usize) -> CacheResult<Option<(RespValue, usize)>> {
    if len < 0 {
        return Ok(Some((RespValue::Bulk(None), start)));
    }
    let end = start.saturating_add(len as usize);
    if buf.len() < end.saturating_add(2) {
        return Ok(None);
    }
    if &buf[end..end + 2] != b"\r\n" {
        return Err(CacheError::Protocol("bulk string missing terminator"));
    }
    Ok(Some((RespValue::Bulk(Some(buf[start..end].to_vec())), end + 2)))
}

fn parse_array(buf: &[u8], len: i64, start: usize) -> CacheResult<Option<(RespValue, usize)>> {
    if len < 0 {
        return Ok(Some((RespValue::Array(None), start)));
    }

    // The length comes off the wire; cap the preallocation.
    let mut items = Vec::with_capacity((len as usize).min(64));
    let mut pos = start;
    for _ in 0..len {
        match parse_at(buf, pos)? {
            Some((item, next)) => {
                items.push(item);
                pos = next;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((RespValue::Array(Some(items)), pos)))
}

/// Returns the index of the `\r` terminating the line that starts at `pos`.
fn find_line_end(buf: &[u8], pos: usize) -> CacheResult<Option<usize>> {
    let Some(offset) = buf[pos..].iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    let newline = pos + offset;
    if newline == pos || buf[newline - 1] != b'\r' {
        return Err(CacheError::Protocol("line not terminated by CRLF"));
    }
    Ok(Some(newline - 1))
}

fn parse_i64(data: &[u8]) -> CacheResult<i64> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(CacheError::Protocol("empty integer"));
    }

    // Accumulate toward the sign so i64::MIN parses without overflow.
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(CacheError::Protocol("invalid integer"));
        }
        let digit = (b - b'0') as i64;
        value = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
            .ok_or(CacheError::Protocol("integer overflow"))?;
    }
    Ok(value)
}

fn push_usize(out: &mut BytesMut, mut value: usize) {
    // Digits go into a stack buffer first to avoid a String allocation.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    buf[..len].reverse();
    out.put_slice(&buf[..len]);
}

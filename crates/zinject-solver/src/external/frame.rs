use std::io::{self, Read, Write};

use super::ProtocolError;

/// `0x` + 8 hex digits + `\n`
pub const HEADER_LEN: usize = 11;

/// Largest payload accepted from the other side
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError> {
    let header = format!("0x{:08x}\n", payload.len());
    writer.write_all(header.as_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame; `None` on end of stream before a header starts
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    let read = read_fully(reader, &mut header)?;
    if read == 0 {
        return Ok(None);
    }
    if read < HEADER_LEN {
        return Err(ProtocolError::Truncated { expected: HEADER_LEN, actual: read });
    }

    let len = parse_header(&header)?;
    let mut payload = vec![0u8; len];
    let read = read_fully(reader, &mut payload)?;
    if read < len {
        return Err(ProtocolError::Truncated { expected: len, actual: read });
    }

    Ok(Some(payload))
}

fn parse_header(header: &[u8]) -> Result<usize, ProtocolError> {
    let invalid = || ProtocolError::InvalidHeader(String::from_utf8_lossy(header).into_owned());

    let text = std::str::from_utf8(header).map_err(|_| invalid())?;
    let digits = text
        .strip_prefix("0x")
        .and_then(|rest| rest.strip_suffix('\n'))
        .filter(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(invalid)?;

    let len = usize::from_str_radix(digits, 16).map_err(|_| invalid())?;
    if len > MAX_FRAME_LEN {
        return Err(invalid());
    }
    Ok(len)
}

/// Fills `buf` unless the stream ends first, returning the bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

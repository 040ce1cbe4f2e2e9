use crate::RelayErrors;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{ErrorKind, Read, Write};

/// Largest payload either side accepts.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Writes `[len: u32 BE][payload]`.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), RelayErrors> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(RelayErrors::FrameTooLarge(payload.len(), MAX_FRAME_SIZE));
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.write_u32::<BigEndian>(payload.len() as u32)?;
    buf.extend_from_slice(payload);
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame. A stream that ends before any header byte is
/// [`RelayErrors::Closed`]; one that ends inside a frame is
/// [`RelayErrors::Truncated`].
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, RelayErrors> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Err(RelayErrors::Closed),
            Ok(0) => return Err(RelayErrors::Truncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let len = (&header[..]).read_u32::<BigEndian>()? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RelayErrors::FrameTooLarge(len, MAX_FRAME_SIZE));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => RelayErrors::Truncated,
        _ => RelayErrors::Io(e),
    })?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_is_big_endian_length() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[7, 8, 9]).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 3, 7, 8, 9]);
        assert_eq!(read_frame(&mut Cursor::new(buf)).unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"first").unwrap();
        write_frame(&mut buf, b"").unwrap();
        write_frame(&mut buf, b"third").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"first");
        assert!(read_frame(&mut cursor).unwrap().is_empty());
        assert_eq!(read_frame(&mut cursor).unwrap(), b"third");
        assert!(matches!(read_frame(&mut cursor), Err(RelayErrors::Closed)));
    }

    #[test]
    fn test_oversize_frames_rejected() {
        let big = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            write_frame(&mut Vec::new(), &big),
            Err(RelayErrors::FrameTooLarge(..))
        ));
        // a header announcing more than the limit is refused before reading
        let header = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes().to_vec();
        assert!(matches!(
            read_frame(&mut Cursor::new(header)),
            Err(RelayErrors::FrameTooLarge(..))
        ));
    }

    #[test]
    fn test_truncated_frames() {
        assert!(matches!(
            read_frame(&mut Cursor::new(vec![0, 0])),
            Err(RelayErrors::Truncated)
        ));
        assert!(matches!(
            read_frame(&mut Cursor::new(vec![0, 0, 0, 4, 1, 2])),
            Err(RelayErrors::Truncated)
        ));
    }
}

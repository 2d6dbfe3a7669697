//! Length-prefixed binary framing.
//!
//! A capture is a plain concatenation of records laid out as
//! `[len:u16 big-endian][len bytes of payload]`. There is no magic number,
//! trailer or checksum. [`FrameDecoder`] turns any [`Read`] into an iterator of
//! [`Frame`]s; [`write_frame`] is the inverse used by tests and tooling.
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX: usize = 2;

/// One undecoded record payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte offset of the length prefix within the source.
    pub offset: u64,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Lazy decoder over a byte source.
///
/// Yields `Ok(frame)` per record and stops cleanly when fewer than two bytes
/// remain before a length prefix. A payload cut short yields one
/// [`Error::TruncatedFrame`] and the iterator is fused afterwards.
pub struct FrameDecoder<R> {
    reader: R,
    offset: u64,
    done: bool,
}

impl FrameDecoder<BufReader<File>> {
    /// Open a capture file with a 1 MiB read buffer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = crate::open_input(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(1 << 20, file)))
    }
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0, done: false }
    }

    /// Decode the next frame, `Ok(None)` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        let mut prefix = [0u8; LENGTH_PREFIX];
        let got = read_up_to(&mut self.reader, &mut prefix)?;
        if got < LENGTH_PREFIX {
            self.done = true;
            return Ok(None);
        }
        let declared = u16::from_be_bytes(prefix);
        let mut payload = vec![0u8; declared as usize];
        let available = read_up_to(&mut self.reader, &mut payload)?;
        if available < payload.len() {
            self.done = true;
            return Err(Error::TruncatedFrame { offset: self.offset, declared, available });
        }
        let frame = Frame { offset: self.offset, payload };
        self.offset += (LENGTH_PREFIX + declared as usize) as u64;
        Ok(Some(frame))
    }
}

impl<R: Read + Seek> FrameDecoder<R> {
    /// Rewind the source so decoding starts again from the first frame.
    pub fn restart(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        self.done = false;
        Ok(())
    }
}

impl<R: Read> Iterator for FrameDecoder<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the source allows; returns the number of bytes read.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Append one length-prefixed record to `w`.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| Error::FrameTooLarge(payload.len()))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(payload)?;
    Ok(())
}

/// Decode every frame of an in-memory buffer.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    FrameDecoder::new(bytes).map(|f| f.map(Frame::into_payload)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn decodes_payload_then_empty_frame() {
        let bytes = [0x00, 0x03, b'a', b'b', b'c', 0x00, 0x00];
        let frames = decode_all(&bytes).unwrap();
        assert_eq!(frames, vec![b"abc".to_vec(), Vec::new()]);
    }

    #[test]
    fn offsets_track_prefixes() {
        let bytes = [0x00, 0x01, 0xff, 0x00, 0x02, 0x01, 0x02];
        let frames: Vec<Frame> = FrameDecoder::new(&bytes[..]).collect::<Result<_>>().unwrap();
        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[1].offset, 3);
        assert_eq!(frames[1].payload, vec![0x01, 0x02]);
    }

    #[test]
    fn single_trailing_byte_ends_stream() {
        let bytes = [0x00, 0x01, 0x07, 0x00];
        let frames = decode_all(&bytes).unwrap();
        assert_eq!(frames, vec![vec![0x07]]);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = [0x00, 0x01, 0x07, 0x00, 0x05, b'x', b'y'];
        let mut dec = FrameDecoder::new(&bytes[..]);
        assert_eq!(dec.next().unwrap().unwrap().payload, vec![0x07]);
        match dec.next() {
            Some(Err(Error::TruncatedFrame { offset, declared, available })) => {
                assert_eq!(offset, 3);
                assert_eq!(declared, 5);
                assert_eq!(available, 2);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(dec.next().is_none());
    }

    #[test]
    fn restart_replays_from_first_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"one").unwrap();
        write_frame(&mut buf, b"two").unwrap();
        let mut dec = FrameDecoder::new(Cursor::new(buf));
        let first: Vec<_> = dec.by_ref().collect::<Result<_>>().unwrap();
        dec.restart().unwrap();
        let second: Vec<_> = dec.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn oversized_payload_rejected() {
        let big = vec![0u8; u16::MAX as usize + 1];
        let mut out = Vec::new();
        assert!(matches!(write_frame(&mut out, &big), Err(Error::FrameTooLarge(65536))));
        assert!(out.is_empty());
    }

    proptest! {
        #[test]
        fn encode_decode_preserves_sequence(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 0..20)
        ) {
            let mut buf = Vec::new();
            for p in &payloads {
                write_frame(&mut buf, p).unwrap();
            }
            prop_assert_eq!(decode_all(&buf).unwrap(), payloads);
        }

        #[test]
        fn cut_inside_payload_never_yields_short_frame(
            payload in proptest::collection::vec(any::<u8>(), 1..200),
            cut in 0usize..200,
        ) {
            let mut buf = Vec::new();
            write_frame(&mut buf, &payload).unwrap();
            let cut = LENGTH_PREFIX + cut % payload.len();
            let result = decode_all(&buf[..cut]);
            prop_assert!(
                matches!(result, Err(Error::TruncatedFrame { .. })),
                "expected truncation error"
            );
        }
    }
}

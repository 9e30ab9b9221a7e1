//! Content-encoding decoding
//!
//! Wraps a response body in a streaming decompressor selected from the
//! `Content-Encoding` value. Nothing is buffered beyond what the decoders
//! themselves need.

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::io::{self, Chain, Cursor, Read};

/// Encodings the bridge knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
    Identity,
}

impl ContentEncoding {
    /// Classify an encoding hint; case-insensitive, surrounding whitespace ignored.
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(str::trim) {
            Some(h) if h.eq_ignore_ascii_case("gzip") || h.eq_ignore_ascii_case("x-gzip") => {
                Self::Gzip
            }
            Some(h) if h.eq_ignore_ascii_case("deflate") => Self::Deflate,
            _ => Self::Identity,
        }
    }
}

/// Wrap `stream` so that reading from it yields the decoded bytes.
pub fn decode<R>(stream: R, hint: Option<&str>) -> Box<dyn Read + Send>
where
    R: Read + Send + 'static,
{
    match ContentEncoding::from_hint(hint) {
        ContentEncoding::Gzip => Box::new(GzDecoder::new(stream)),
        ContentEncoding::Deflate => Box::new(DeflateReader::new(stream)),
        ContentEncoding::Identity => Box::new(stream),
    }
}

type Replayed<R> = Chain<Cursor<Vec<u8>>, R>;

/// `deflate` in the wild is either zlib-wrapped (as the RFC says) or a raw
/// deflate stream. The first two bytes decide which decoder is used.
struct DeflateReader<R> {
    state: DeflateState<R>,
}

enum DeflateState<R> {
    Sniffing(Option<R>),
    Zlib(ZlibDecoder<Replayed<R>>),
    Raw(DeflateDecoder<Replayed<R>>),
}

impl<R: Read> DeflateReader<R> {
    fn new(inner: R) -> Self {
        Self {
            state: DeflateState::Sniffing(Some(inner)),
        }
    }

    fn sniff(&mut self) -> io::Result<()> {
        if let DeflateState::Sniffing(inner) = &mut self.state {
            let mut inner = inner
                .take()
                .ok_or_else(|| io::Error::other("deflate stream failed while reading its header"))?;

            let mut head = Vec::with_capacity(2);
            (&mut inner).take(2).read_to_end(&mut head)?;

            let zlib = is_zlib_header(&head);
            let replayed = Cursor::new(head).chain(inner);
            self.state = if zlib {
                DeflateState::Zlib(ZlibDecoder::new(replayed))
            } else {
                DeflateState::Raw(DeflateDecoder::new(replayed))
            };
        }
        Ok(())
    }
}

impl<R: Read> Read for DeflateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.sniff()?;
        match &mut self.state {
            DeflateState::Zlib(decoder) => decoder.read(buf),
            DeflateState::Raw(decoder) => decoder.read(buf),
            DeflateState::Sniffing(_) => Err(io::Error::other("deflate stream not initialized")),
        }
    }
}

/// CM must be 8 (deflate) and the header checksum must be a multiple of 31.
fn is_zlib_header(head: &[u8]) -> bool {
    match head {
        [cmf, flg] => cmf & 0x0F == 8 && (u16::from(*cmf) * 256 + u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    const BODY: &[u8] = br#"{"users":[{"id":1,"name":"Ada"}]}"#;

    fn read_all(mut reader: Box<dyn Read + Send>) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_encoding_hint_classification() {
        assert_eq!(ContentEncoding::from_hint(Some("gzip")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_hint(Some(" GZIP ")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_hint(Some("x-gzip")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_hint(Some("Deflate")), ContentEncoding::Deflate);
        assert_eq!(ContentEncoding::from_hint(Some("br")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_hint(None), ContentEncoding::Identity);
    }

    #[test]
    fn test_gzip_decodes() {
        let decoded = read_all(decode(Cursor::new(gzip(BODY)), Some("gzip")));
        assert_eq!(decoded, BODY);
    }

    #[test]
    fn test_zlib_wrapped_deflate_decodes() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(BODY).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = read_all(decode(Cursor::new(compressed), Some("deflate")));
        assert_eq!(decoded, BODY);
    }

    #[test]
    fn test_raw_deflate_decodes() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(BODY).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = read_all(decode(Cursor::new(compressed), Some("deflate")));
        assert_eq!(decoded, BODY);
    }

    #[test]
    fn test_unknown_encoding_passes_through() {
        let compressed = gzip(BODY);
        let passed = read_all(decode(Cursor::new(compressed.clone()), Some("br")));
        assert_eq!(passed, compressed);

        let identity = read_all(decode(Cursor::new(BODY.to_vec()), None));
        assert_eq!(identity, BODY);
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let mut reader = decode(Cursor::new(b"definitely not gzip".to_vec()), Some("gzip"));
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_zlib_header_detection() {
        assert!(is_zlib_header(&[0x78, 0x9C]));
        assert!(is_zlib_header(&[0x78, 0x01]));
        assert!(!is_zlib_header(&[0x78, 0x00]));
        assert!(!is_zlib_header(&[0x1F]));
        assert!(!is_zlib_header(&[]));
    }
}

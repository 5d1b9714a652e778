//! Streaming decompression for input documents.
//!
//! Codecs wrap the opened file in a decompressing reader so the decoder never
//! sees compressed bytes and never holds the whole document.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;

/// A codec that can wrap a reader with on-the-fly decompression.
pub trait CompressionCodec: Send + Sync {
    fn wrap(&self, input: Box<dyn Read + Send>) -> io::Result<Box<dyn BufRead + Send>>;

    /// Human-readable name of this codec (for logging).
    fn name(&self) -> &'static str;
}

/// Pass-through for uncompressed input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCodec;

impl CompressionCodec for NoopCodec {
    fn wrap(&self, input: Box<dyn Read + Send>) -> io::Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(BufReader::new(input)))
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Gzip codec using flate2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn wrap(&self, input: Box<dyn Read + Send>) -> io::Result<Box<dyn BufRead + Send>> {
        // MultiGzDecoder also handles concatenated members (e.g. from `cat a.gz b.gz`)
        Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(
            input,
        ))))
    }

    fn name(&self) -> &'static str {
        "gzip"
    }
}

/// Zstandard codec using zstd.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl CompressionCodec for ZstdCodec {
    fn wrap(&self, input: Box<dyn Read + Send>) -> io::Result<Box<dyn BufRead + Send>> {
        let decoder = zstd::stream::Decoder::new(input)?;
        Ok(Box::new(BufReader::new(decoder)))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// Configured compression of the input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Zstd,
    /// Pick by file extension: `.gz` is gzip, `.zst` / `.zstd` is zstd.
    #[default]
    Auto,
}

impl Compression {
    /// Resolve `Auto` against a path. Other values are returned as is.
    pub fn resolve(self, path: &Path) -> Compression {
        if self != Compression::Auto {
            return self;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") | Some("gzip") => Compression::Gzip,
            Some("zst") | Some("zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// The codec for a resolved compression.
    pub fn codec(&self) -> Box<dyn CompressionCodec> {
        match self {
            Compression::Gzip => Box::new(GzipCodec),
            Compression::Zstd => Box::new(ZstdCodec),
            Compression::None | Compression::Auto => Box::new(NoopCodec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read_all(mut reader: Box<dyn BufRead + Send>) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_resolve_by_extension() {
        assert_eq!(
            Compression::Auto.resolve(Path::new("data.json.gz")),
            Compression::Gzip
        );
        assert_eq!(
            Compression::Auto.resolve(Path::new("data.json.zst")),
            Compression::Zstd
        );
        assert_eq!(
            Compression::Auto.resolve(Path::new("data.json")),
            Compression::None
        );
        assert_eq!(
            Compression::Gzip.resolve(Path::new("data.json")),
            Compression::Gzip
        );
    }

    #[test]
    fn test_gzip_roundtrip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(br#"[{"a":1}]"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let reader = GzipCodec
            .wrap(Box::new(std::io::Cursor::new(compressed)))
            .unwrap();
        assert_eq!(read_all(reader), r#"[{"a":1}]"#);
    }

    #[test]
    fn test_zstd_roundtrip() {
        let compressed = zstd::encode_all(&br#"[{"b":2}]"#[..], 3).unwrap();

        let reader = ZstdCodec
            .wrap(Box::new(std::io::Cursor::new(compressed)))
            .unwrap();
        assert_eq!(read_all(reader), r#"[{"b":2}]"#);
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(Compression::Gzip.codec().name(), "gzip");
        assert_eq!(Compression::Zstd.codec().name(), "zstd");
        assert_eq!(Compression::None.codec().name(), "none");
    }
}

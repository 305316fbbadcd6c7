// Incremental UTF-8 decoding of pipe reads

/// Decodes a byte stream chunk by chunk
///
/// A multi-byte character split across two reads is held back until the rest
/// arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning whatever text is complete so far
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this slice is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Truncated character at the end, wait for more bytes
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let remainder = rest.to_vec();
        self.pending = remainder;
        out
    }

    /// Flush bytes left over at end of stream
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_split_character_is_reassembled() {
        let bytes = "héllo €".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();

        // 'é' is 0xC3 0xA9: cut between the two bytes
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.decode(&bytes[2..bytes.len() - 1]), "éllo ");
        assert_eq!(decoder.decode(&bytes[bytes.len() - 1..]), "€");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_is_flushed_lossily() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"ok\xE2\x82"), "ok");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}

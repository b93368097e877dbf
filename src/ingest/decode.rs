/// Incremental UTF-8 decoding of stream chunks. Invalid sequences become
/// U+FFFD; an incomplete sequence at the end of a chunk waits for the next one.
#[derive(Debug, Default)]
pub(super) struct Utf8Decoder {
    carry: Vec<u8>,
}

fn push_replacement(out: &mut Vec<u8>) {
    let mut encoded = [0u8; 4];
    out.extend_from_slice(char::REPLACEMENT_CHARACTER.encode_utf8(&mut encoded).as_bytes());
}

impl Utf8Decoder {
    /// Appends the decodable part of `chunk` to `out`. Returns how many
    /// invalid sequences were replaced.
    pub(super) fn decode(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> usize {
        self.carry.extend_from_slice(chunk);

        let mut input = self.carry.as_slice();
        let mut replaced = 0;
        loop {
            let Err(error) = std::str::from_utf8(input) else {
                out.extend_from_slice(input);
                input = &[];
                break;
            };

            let (valid, rest) = input.split_at(error.valid_up_to());
            out.extend_from_slice(valid);
            let Some(invalid) = error.error_len() else {
                input = rest;
                break;
            };
            push_replacement(out);
            replaced += 1;
            input = &rest[invalid..];
        }

        let kept = input.len();
        let decoded = self.carry.len() - kept;
        self.carry.drain(..decoded);
        replaced
    }

    pub(super) fn pending(&self) -> usize {
        self.carry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8Decoder::default();
        let mut out = Vec::new();

        let replaced = decoder.decode(b"ab\xFF\xFEcd\xC3", &mut out);
        assert_eq!(replaced, 2);
        assert_eq!(String::from_utf8(out).expect("utf-8 output"), "ab\u{FFFD}\u{FFFD}cd");
        assert_eq!(decoder.pending(), 1);
    }

    #[test]
    fn split_character_waits_for_the_rest() {
        let mut decoder = Utf8Decoder::default();
        let mut out = Vec::new();
        let bytes = "ü".as_bytes();

        assert_eq!(decoder.decode(&bytes[..1], &mut out), 0);
        assert!(out.is_empty());
        assert_eq!(decoder.pending(), 1);

        assert_eq!(decoder.decode(&bytes[1..], &mut out), 0);
        assert_eq!(out, bytes);
        assert_eq!(decoder.pending(), 0);
    }
}

use serde_json::Value;

use crate::error::StreamError;

/// How fragment boundaries are recovered from the byte stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Framing {
    /// Back-to-back JSON values with no delimiter. Incomplete trailing values
    /// are re-parsed from their first byte when more input arrives.
    #[default]
    Concatenated,
    /// One JSON value per `\n`-terminated line.
    Lines,
}

impl Framing {
    pub fn label(self) -> &'static str {
        match self {
            Self::Concatenated => "concatenated",
            Self::Lines => "lines",
        }
    }
}

/// Complete values found at the front of a buffer.
pub(super) struct Extracted {
    pub(super) values: Vec<Value>,
    /// Bytes at the front of the buffer that are fully accounted for.
    pub(super) consumed: usize,
    pub(super) error: Option<StreamError>,
}

impl Framing {
    /// `base_offset` is the absolute stream position of `buffer[0]`, used only
    /// for error reporting.
    pub(super) fn extract(self, buffer: &[u8], base_offset: usize) -> Extracted {
        match self {
            Self::Concatenated => extract_concatenated(buffer, base_offset),
            Self::Lines => extract_lines(buffer, base_offset),
        }
    }

    /// Decodes whatever is left once the producer has closed the stream.
    pub(super) fn extract_final(self, buffer: &[u8], base_offset: usize) -> Extracted {
        match self {
            Self::Concatenated => extract_concatenated(buffer, base_offset),
            Self::Lines => {
                let mut extracted = extract_lines(buffer, base_offset);
                if extracted.error.is_some() {
                    return extracted;
                }

                let tail = buffer[extracted.consumed..].trim_ascii();
                if !tail.is_empty()
                    && let Ok(value) = serde_json::from_slice::<Value>(tail)
                {
                    extracted.values.push(value);
                    extracted.consumed = buffer.len();
                }
                extracted
            }
        }
    }
}

fn extract_concatenated(buffer: &[u8], base_offset: usize) -> Extracted {
    let mut stream = serde_json::Deserializer::from_slice(buffer).into_iter::<Value>();
    let mut values = Vec::new();
    let mut consumed = 0;

    loop {
        match stream.next() {
            Some(Ok(value)) => {
                values.push(value);
                consumed = stream.byte_offset();
            }
            Some(Err(error)) if error.is_eof() => break,
            Some(Err(error)) => {
                return Extracted {
                    values,
                    consumed,
                    error: Some(StreamError::Syntax {
                        offset: base_offset + consumed,
                        source: error,
                    }),
                };
            }
            None => {
                consumed = stream.byte_offset();
                break;
            }
        }
    }

    Extracted {
        values,
        consumed,
        error: None,
    }
}

fn extract_lines(buffer: &[u8], base_offset: usize) -> Extracted {
    let mut values = Vec::new();
    let mut consumed = 0;

    while let Some(newline) = buffer[consumed..].iter().position(|&byte| byte == b'\n') {
        let line_offset = consumed;
        let line = buffer[consumed..consumed + newline].trim_ascii();
        consumed += newline + 1;

        if line.is_empty() {
            continue;
        }

        match serde_json::from_slice::<Value>(line) {
            Ok(value) => values.push(value),
            Err(error) => {
                return Extracted {
                    values,
                    consumed,
                    error: Some(StreamError::Syntax {
                        offset: base_offset + line_offset,
                        source: error,
                    }),
                };
            }
        }
    }

    Extracted {
        values,
        consumed,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_splits_back_to_back_objects() {
        let extracted = Framing::Concatenated.extract(br#"{"a":1}{"b":2} {"c""#, 0);

        assert_eq!(extracted.values.len(), 2);
        assert_eq!(extracted.consumed, 14);
        assert!(extracted.error.is_none());
    }

    #[test]
    fn concatenated_waits_on_incomplete_value() {
        let extracted = Framing::Concatenated.extract(br#"{"nodes":[{"id":"c""#, 0);

        assert!(extracted.values.is_empty());
        assert_eq!(extracted.consumed, 0);
        assert!(extracted.error.is_none());
    }

    #[test]
    fn concatenated_consumes_trailing_whitespace() {
        let extracted = Framing::Concatenated.extract(b"{}\n  ", 0);

        assert_eq!(extracted.values.len(), 1);
        assert_eq!(extracted.consumed, 5);
    }

    #[test]
    fn concatenated_reports_hard_syntax_errors_with_offset() {
        let extracted = Framing::Concatenated.extract(br#"{"a":1} ]"#, 100);

        assert_eq!(extracted.values.len(), 1);
        match extracted.error {
            Some(StreamError::Syntax { offset, .. }) => assert_eq!(offset, 107),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn lines_keep_unterminated_tail() {
        let extracted = Framing::Lines.extract(b"{\"a\":1}\r\n\n{\"b\":", 0);

        assert_eq!(extracted.values.len(), 1);
        assert_eq!(extracted.consumed, 10);
        assert!(extracted.error.is_none());
    }

    #[test]
    fn lines_reject_a_bad_complete_line() {
        let extracted = Framing::Lines.extract(b"{\"a\":1}\n{oops}\n", 0);

        assert_eq!(extracted.values.len(), 1);
        assert!(matches!(
            extracted.error,
            Some(StreamError::Syntax { offset: 8, .. })
        ));
    }

    #[test]
    fn lines_accept_unterminated_final_value_at_close() {
        let extracted = Framing::Lines.extract_final(b"{\"a\":1}\n{\"b\":2}", 0);

        assert_eq!(extracted.values.len(), 2);
        assert_eq!(extracted.consumed, 15);
    }
}

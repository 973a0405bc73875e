//! Control channel text encoding
//!
//! Sessions start in UTF-8; `OPTS UTF8 OFF` falls back to Latin-1 for old
//! clients that send raw 8-bit file names.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    /// Decode raw control bytes. Invalid UTF-8 is replaced, never rejected.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encode text for the wire. Characters outside Latin-1 become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_maps_high_bytes_to_chars() {
        assert_eq!(TextEncoding::Latin1.decode(&[0x52, 0xe4, 0x6b]), "Räk");
        assert_eq!(TextEncoding::Latin1.encode("Räk€"), vec![0x52, 0xe4, 0x6b, b'?']);
    }

    #[test]
    fn utf8_is_lossy_on_invalid_input() {
        assert_eq!(TextEncoding::Utf8.decode(b"ok\xff"), "ok\u{fffd}");
        assert_eq!(TextEncoding::Utf8.encode("Räk"), "Räk".as_bytes());
    }
}

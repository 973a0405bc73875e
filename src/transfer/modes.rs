//! FTP representation types
//!
//! `TYPE A` selects text transfers, `TYPE I` binary (image) transfers.

/// Representation type used for STOR/APPE. Downloads are always sent as
/// stored on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    #[default]
    Text,
    Binary,
}

impl TransferMode {
    /// Parse the argument of `TYPE`. Only `A` and `I` are supported; a
    /// trailing format control (`A N`) is accepted and ignored.
    pub fn from_type_argument(arg: &str) -> Option<Self> {
        let code = arg.split_whitespace().next()?;
        match code.to_ascii_uppercase().as_str() {
            "A" => Some(TransferMode::Text),
            "I" => Some(TransferMode::Binary),
            _ => None,
        }
    }

    pub fn type_code(&self) -> char {
        match self {
            TransferMode::Text => 'A',
            TransferMode::Binary => 'I',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_types() {
        assert_eq!(TransferMode::from_type_argument("i"), Some(TransferMode::Binary));
        assert_eq!(TransferMode::from_type_argument("A N"), Some(TransferMode::Text));
        assert_eq!(TransferMode::from_type_argument("E"), None);
        assert_eq!(TransferMode::from_type_argument("L 8"), None);
    }
}

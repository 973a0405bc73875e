//! Module `command`
//!
//! Defines the FTP command parsing logic: the first whitespace-delimited
//! token is the verb, the trimmed remainder is a single optional argument.

/// Represents an FTP command parsed from the client input.
///
/// Commands that require arguments store them as `String` variants.
/// Aliases collapse onto one variant (XPWD → PWD, RM → RMD, NLST → LIST).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    USER(String),
    PASS(String),
    QUIT,
    FEAT,
    SYST,
    OPTS(String),
    NOOP,
    PORT(String),
    PASV,
    TYPE(String),
    PWD,
    CWD(String),
    CDUP,
    MKD(String),
    DELE(String),
    RMD(String),
    RNFR(String),
    RNTO(String),
    REST(String),
    LIST,
    RETR(String),
    STOR(String),
    APPE(String),
    SIZE(String),
    MDTM(String),
    XINFO,          // Session census for operators
    INVALID(String), // Known verb without its required argument
    UNKNOWN(String), // Unknown or unsupported verb
}

/// Outcome of a handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

impl Command {
    /// Whether the command is refused before login.
    pub fn requires_login(&self) -> bool {
        !matches!(
            self,
            Command::USER(_)
                | Command::PASS(_)
                | Command::QUIT
                | Command::FEAT
                | Command::SYST
                | Command::OPTS(_)
                | Command::NOOP
        )
    }
}

/// Parses a raw command line received from a client into the `Command` enum.
///
/// Returns `INVALID` when a verb that needs an argument arrives without one.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    let required = |build: fn(String) -> Command| {
        if arg.is_empty() {
            Command::INVALID(cmd.clone())
        } else {
            build(arg.to_string())
        }
    };

    match cmd.as_str() {
        "USER" => required(Command::USER),
        "PASS" => Command::PASS(arg.to_string()),
        "QUIT" => Command::QUIT,
        "FEAT" => Command::FEAT,
        "SYST" => Command::SYST,
        "OPTS" => required(Command::OPTS),
        "NOOP" => Command::NOOP,
        "PORT" => required(Command::PORT),
        "PASV" => Command::PASV,
        "TYPE" => required(Command::TYPE),
        "PWD" | "XPWD" => Command::PWD,
        "CWD" => required(Command::CWD),
        "CDUP" => Command::CDUP,
        "MKD" => required(Command::MKD),
        "DELE" => required(Command::DELE),
        "RMD" | "RM" => required(Command::RMD),
        "RNFR" => required(Command::RNFR),
        "RNTO" => required(Command::RNTO),
        "REST" => required(Command::REST),
        "LIST" | "NLST" => Command::LIST,
        "RETR" => required(Command::RETR),
        "STOR" => required(Command::STOR),
        "APPE" => required(Command::APPE),
        "SIZE" => required(Command::SIZE),
        "MDTM" => required(Command::MDTM),
        "XINFO" | "INFOSYS" => Command::XINFO,
        _ => Command::UNKNOWN(cmd),
    }
}

/// The line as it may appear in logs: passwords are masked.
pub fn loggable_line(raw: &str) -> String {
    let trimmed = raw.trim();
    let verb = trimmed.split_whitespace().next().unwrap_or("");
    if verb.eq_ignore_ascii_case("PASS") {
        format!("{verb} ****")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_is_case_insensitive_and_argument_keeps_spaces() {
        assert_eq!(
            parse_command("stor  my file.txt \r\n"),
            Command::STOR("my file.txt".into())
        );
        assert_eq!(parse_command("cdup"), Command::CDUP);
    }

    #[test]
    fn aliases_collapse() {
        assert_eq!(parse_command("XPWD"), Command::PWD);
        assert_eq!(parse_command("RM old"), Command::RMD("old".into()));
        assert_eq!(parse_command("NLST"), Command::LIST);
        assert_eq!(parse_command("LIST -la"), Command::LIST);
        assert_eq!(parse_command("INFOSYS"), Command::XINFO);
    }

    #[test]
    fn missing_argument_is_invalid() {
        assert_eq!(parse_command("RETR"), Command::INVALID("RETR".into()));
        assert_eq!(parse_command("CWD   "), Command::INVALID("CWD".into()));
        assert_eq!(parse_command("PASS"), Command::PASS(String::new()));
    }

    #[test]
    fn unknown_verbs_are_reported_upper_cased() {
        assert_eq!(parse_command("site chmod"), Command::UNKNOWN("SITE".into()));
    }

    #[test]
    fn login_gate() {
        assert!(!Command::USER("a".into()).requires_login());
        assert!(!Command::OPTS("UTF8 ON".into()).requires_login());
        assert!(Command::PASV.requires_login());
        assert!(Command::XINFO.requires_login());
        assert!(Command::UNKNOWN("X".into()).requires_login());
    }

    #[test]
    fn passwords_are_masked_for_logs() {
        assert_eq!(loggable_line("pass hunter2"), "pass ****");
        assert_eq!(loggable_line("USER bob"), "USER bob");
    }
}

//! Owner command parsing for the private chat.

/// Administrative commands the owner may issue in private.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Counters: users, groups, whispers.
    Stats,
    /// Arm a broadcast; the next private message is the banner.
    Broadcast,
    /// Grant a watcher oversight of a group's whispers.
    ReportOpen { group_id: i64, watcher_id: i64 },
    /// Revoke a watcher's oversight.
    ReportClose { group_id: i64, watcher_id: i64 },
}

/// Parse an owner command. Returns `None` for anything that is not one,
/// including well-formed commands with missing or non-numeric arguments.
pub fn parse(text: &str) -> Option<AdminCommand> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;

    let parsed = match command {
        "/stats" => AdminCommand::Stats,
        "/broadcast" => AdminCommand::Broadcast,
        "/report_open" | "/report_close" => {
            let group_id = parts.next()?.parse().ok()?;
            let watcher_id = parts.next()?.parse().ok()?;
            if command == "/report_open" {
                AdminCommand::ReportOpen {
                    group_id,
                    watcher_id,
                }
            } else {
                AdminCommand::ReportClose {
                    group_id,
                    watcher_id,
                }
            }
        }
        _ => return None,
    };

    // Trailing junk makes the command ambiguous; reject it.
    if parts.next().is_some() {
        return None;
    }
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stats_and_broadcast() {
        assert_eq!(parse("/stats"), Some(AdminCommand::Stats));
        assert_eq!(parse("/broadcast"), Some(AdminCommand::Broadcast));
    }

    #[test]
    fn parses_report_open_with_negative_group_id() {
        assert_eq!(
            parse("/report_open -1001234 567"),
            Some(AdminCommand::ReportOpen {
                group_id: -1001234,
                watcher_id: 567
            })
        );
    }

    #[test]
    fn parses_report_close() {
        assert_eq!(
            parse("/report_close -5 6"),
            Some(AdminCommand::ReportClose {
                group_id: -5,
                watcher_id: 6
            })
        );
    }

    #[test]
    fn rejects_missing_or_bad_arguments() {
        assert_eq!(parse("/report_open"), None);
        assert_eq!(parse("/report_open -5"), None);
        assert_eq!(parse("/report_open abc def"), None);
    }

    #[test]
    fn rejects_trailing_junk() {
        assert_eq!(parse("/stats now"), None);
        assert_eq!(parse("/report_open -5 6 7"), None);
    }

    #[test]
    fn rejects_unknown_commands_and_plain_text() {
        assert_eq!(parse("/unknown"), None);
        assert_eq!(parse("hello"), None);
        assert_eq!(parse(""), None);
    }
}

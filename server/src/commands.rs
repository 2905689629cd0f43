//! Chat commands.
//!
//! A chat line starting with `/` is split into `/`-separated segments and each
//! segment is parsed on its own. Segments that do not parse are ignored.

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// List online players.
    Players,
    /// The admin keyword; grants command privileges.
    Privilege,
    Party(String),
    Xp(f64),
    /// Rebalances the plane's top end around a new engine power.
    Ep(f64),
    Detach,
    ItemTest(u32),
}

impl ChatCommand {
    pub fn requires_privilege(&self) -> bool {
        !matches!(self, ChatCommand::Players | ChatCommand::Privilege)
    }

    pub fn parse(segment: &str, admin_keyword: &str) -> Option<Self> {
        let mut words = segment.split_whitespace();
        let name = words.next()?;
        let args: Vec<&str> = words.collect();

        match (name, args.as_slice()) {
            ("players", []) => Some(ChatCommand::Players),
            (keyword, []) if keyword == admin_keyword => Some(ChatCommand::Privilege),
            ("party", [party]) if is_word(party) => Some(ChatCommand::Party(party.to_string())),
            ("xp", [amount]) => parse_amount(amount).map(ChatCommand::Xp),
            ("ep", [amount]) => parse_amount(amount).map(ChatCommand::Ep),
            ("detach", []) => Some(ChatCommand::Detach),
            ("itemtest", [id]) if id.chars().all(|c| c.is_ascii_digit()) => {
                id.parse().ok().map(ChatCommand::ItemTest)
            }
            _ => None,
        }
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Unsigned decimal: digits with an optional fractional part.
fn parse_amount(s: &str) -> Option<f64> {
    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };
    let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    if !digits(whole) || !fraction.map_or(true, digits) {
        return None;
    }
    s.parse().ok()
}

/// Parses every command in a chat line, in order.
pub fn parse_line(line: &str, admin_keyword: &str) -> Vec<ChatCommand> {
    line.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| ChatCommand::parse(segment, admin_keyword))
        .collect()
}

/// Splits parsed commands into those anyone may run and those needing privileges,
/// keeping the line order within each group.
pub fn partition(commands: Vec<ChatCommand>) -> (Vec<ChatCommand>, Vec<ChatCommand>) {
    commands.into_iter().partition(|c| !c.requires_privilege())
}

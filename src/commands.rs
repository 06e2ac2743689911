/// Interactive commands and autocomplete logic

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "next",
    aliases: &["n"],
    description: "Go to the next page",
  },
  Command {
    name: "prev",
    aliases: &["p", "previous"],
    description: "Go to the previous page",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Refetch the current page",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit querydeck",
  },
];

/// Prefix that marks a line as a command rather than search text.
pub const COMMAND_PREFIX: char = ':';

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
  /// `:name`, resolved to its best matching command
  Command(&'static Command),
  /// Any other line is new search text
  Search(String),
  /// `:name` with no matching command
  Unknown(String),
}

/// Classify a line typed at the prompt.
pub fn parse_input(line: &str) -> Input {
  let line = line.trim();
  match line.strip_prefix(COMMAND_PREFIX) {
    Some(name) => {
      let name = name.trim();
      match get_suggestions(name).first() {
        Some(cmd) if !name.is_empty() => Input::Command(cmd),
        _ => Input::Unknown(name.to_string()),
      }
    }
    None => Input::Search(line.to_string()),
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    if cmd.name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// One line per command, for `:help`.
pub fn help_text() -> String {
  COMMANDS
    .iter()
    .map(|cmd| {
      format!(
        "  :{:<8} {:<14} {}",
        cmd.name,
        cmd.aliases.join(", "),
        cmd.description
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

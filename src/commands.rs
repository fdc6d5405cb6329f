/// Available commands, autocomplete and parsing of submitted command lines
use crate::route::Route;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  /// Argument hint shown next to the name
  pub args: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "list",
    aliases: &["l", "pages", "home"],
    args: "[page]",
    description: "Paginated listing",
  },
  Command {
    name: "load-more",
    aliases: &["more", "m", "search"],
    args: "[term]",
    description: "Load-more listing with search",
  },
  Command {
    name: "pokemon",
    aliases: &["p", "show"],
    args: "<id|name>",
    description: "Open one entry",
  },
  Command {
    name: "open",
    aliases: &["o", "goto"],
    args: "<path>",
    description: "Open a route, e.g. /pokemon/25",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    args: "",
    description: "Exit dexterm",
  },
];

/// What a submitted command line asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
  /// Replace the navigation stack with this route
  Open(Route),
  /// Push a detail view on top of the current one
  Show(String),
  Quit,
}

/// Get autocomplete suggestions for the command word of `input`
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let (word, _) = split_command(input);
  let word = word.to_lowercase();

  if word.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    let priority = if cmd.name == word {
      0
    } else if cmd.aliases.contains(&word.as_str()) {
      1
    } else if cmd.name.starts_with(&word) {
      2
    } else if cmd.aliases.iter().any(|a| a.starts_with(&word)) {
      3
    } else if cmd.name.contains(&word) {
      4
    } else if cmd.aliases.iter().any(|a| a.contains(&word)) {
      5
    } else {
      continue;
    };
    matches.push((cmd, priority));
  }

  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Parse a full command line (command word already resolved or typed out)
pub fn parse(input: &str) -> Result<CommandAction, String> {
  let (word, rest) = split_command(input);
  let word = word.to_lowercase();
  let cmd = COMMANDS
    .iter()
    .find(|c| c.name == word || c.aliases.contains(&word.as_str()))
    .ok_or_else(|| format!("Unknown command: {}", word))?;

  match cmd.name {
    "list" => {
      let page = if rest.is_empty() {
        1
      } else {
        rest
          .parse::<u32>()
          .ok()
          .filter(|p| *p > 0)
          .ok_or_else(|| format!("Not a page number: {}", rest))?
      };
      Ok(CommandAction::Open(Route::Paginated { page }))
    }
    "load-more" => Ok(CommandAction::Open(Route::LoadMore {
      query: (!rest.is_empty()).then(|| rest.to_string()),
    })),
    "pokemon" if rest.is_empty() => Err("Usage: pokemon <id|name>".to_string()),
    "pokemon" => Ok(CommandAction::Show(rest.to_lowercase())),
    "open" if rest.is_empty() => Err("Usage: open <path>".to_string()),
    "open" => Ok(CommandAction::Open(Route::parse(rest))),
    _ => Ok(CommandAction::Quit),
  }
}

/// Split into the command word and the trimmed remainder
pub fn split_command(input: &str) -> (&str, &str) {
  let input = input.trim_start();
  match input.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (input.trim_end(), ""),
  }
}

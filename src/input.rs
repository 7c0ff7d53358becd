use crate::events::Event;

pub const HELP: &str = "\
commands:
  add <title>      create a task (or `add` to submit the current input)
  title <text>     set the create input without submitting
  search [text]    filter tasks; empty clears the filter
  refresh          reload the list for the current search
  edit <id>        edit a task inline
  draft <text>     change the edit draft
  save [text]      save the edit (optionally replacing the draft first)
  delete <id>      delete a task
  logout           sign out
  help             show this help
  quit             exit";

#[derive(Debug)]
pub enum Command {
    Dispatch(Vec<Event>),
    Help,
    Quit,
    Empty,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
}

pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((line, ""));

    let events = match name.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "add" if rest.is_empty() => vec![Event::CreateRequested],
        "add" => vec![
            Event::TitleInputChanged(rest.to_string()),
            Event::CreateRequested,
        ],
        "title" => vec![Event::TitleInputChanged(rest.to_string())],
        "search" => vec![Event::SearchChanged(rest.to_string())],
        "refresh" => vec![Event::RefreshRequested],
        "edit" => vec![Event::EditRequested(required("edit", rest)?)],
        "draft" => vec![Event::EditDraftChanged(rest.to_string())],
        "save" if rest.is_empty() => vec![Event::SaveRequested],
        "save" => vec![
            Event::EditDraftChanged(rest.to_string()),
            Event::SaveRequested,
        ],
        "delete" | "rm" => vec![Event::DeleteRequested(required("delete", rest)?)],
        "logout" => vec![Event::LogoutRequested],
        _ => return Err(InputError::Unknown(name.to_string())),
    };
    Ok(Command::Dispatch(events))
}

fn required(command: &'static str, rest: &str) -> Result<String, InputError> {
    if rest.is_empty() {
        return Err(InputError::MissingArgument(command));
    }
    Ok(rest.to_string())
}

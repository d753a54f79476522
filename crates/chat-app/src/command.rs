use std::path::PathBuf;

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    ListModels,
    SelectModel(String),
    ToggleSearch,
    Image(PathBuf),
    Attach(PathBuf),
    /// 1-based position in the transcript.
    Edit(usize),
    CancelEdit,
    Clear,
    SetUrl(String),
    SetSystemPrompt(String),
    Ask(String),
    History,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "\
commands:
  <text>            send a message (or the replacement while editing)
  /models           refresh and list installed models
  /model <name>     use a model for the next requests
  /search           toggle web search for new messages
  /image <path>     add an image to the next message
  /attach <path>    attach a file (images join the next message)
  /edit <n>         edit your message number n from /history
  /cancel           stop editing
  /clear            forget the conversation
  /url <url>        set the Ollama server address
  /system <prompt>  set the system prompt used by /ask
  /ask <prompt>     one-off question without history
  /history          show the conversation
  /quit             leave";

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line.trim().to_string());
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match (name, argument) {
            ("models", _) => Self::ListModels,
            ("search", _) => Self::ToggleSearch,
            ("cancel", _) => Self::CancelEdit,
            ("clear", _) => Self::Clear,
            ("history", _) => Self::History,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            ("model" | "image" | "attach" | "edit" | "url" | "system" | "ask", "") => {
                Self::Invalid(format!("/{name} needs an argument"))
            }
            ("model", name) => Self::SelectModel(name.to_string()),
            ("image", path) => Self::Image(PathBuf::from(path)),
            ("attach", path) => Self::Attach(PathBuf::from(path)),
            ("edit", position) => match position.parse::<usize>() {
                Ok(position) if position > 0 => Self::Edit(position),
                _ => Self::Invalid(format!("not a message number: {position}")),
            },
            ("url", url) => Self::SetUrl(url.to_string()),
            ("system", prompt) => Self::SetSystemPrompt(prompt.to_string()),
            ("ask", prompt) => Self::Ask(prompt.to_string()),
            (name, _) => Self::Invalid(format!("unknown command /{name}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(Command::parse("  hello there \n"), Command::Send("hello there".into()));
        assert_eq!(Command::parse(""), Command::Send(String::new()));
    }

    #[test]
    fn commands_take_the_rest_of_the_line_as_argument() {
        assert_eq!(
            Command::parse("/model llama3:8b"),
            Command::SelectModel("llama3:8b".into())
        );
        assert_eq!(
            Command::parse("/image /tmp/my photo.png"),
            Command::Image(PathBuf::from("/tmp/my photo.png"))
        );
        assert_eq!(
            Command::parse("/system   Answer in French.  "),
            Command::SetSystemPrompt("Answer in French.".into())
        );
        assert_eq!(Command::parse("/edit 3"), Command::Edit(3));
        assert_eq!(Command::parse("/search"), Command::ToggleSearch);
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(matches!(Command::parse("/edit zero"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/edit 0"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/url"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/frobnicate"), Command::Invalid(_)));
    }
}

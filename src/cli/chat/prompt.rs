use rustyline::{Config, Editor, Result};

/// What the input line is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Question,
    EmailAddress,
}

pub fn generate_prompt(mode: InputMode) -> String {
    match mode {
        InputMode::Question => "pregunta> ".to_string(),
        InputMode::EmailAddress => "correo> ".to_string(),
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}

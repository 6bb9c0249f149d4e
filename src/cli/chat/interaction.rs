use std::fmt;

/// One of the follow-up actions offered after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionChoice {
    Email,
    Pdf,
    Decline,
}

impl InteractionChoice {
    /// Maps a prompt command (`/email`, `/pdf`, `/no`) to its choice.
    pub fn from_command(command: &str) -> Option<Self> {
        match command.trim().to_lowercase().as_str() {
            "/email" => Some(Self::Email),
            "/pdf" => Some(Self::Pdf),
            "/no" => Some(Self::Decline),
            _ => None,
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Self::Email => "/email",
            Self::Pdf => "/pdf",
            Self::Decline => "/no",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Email => "Enviar por Email",
            Self::Pdf => "Descargar PDF",
            Self::Decline => "No, gracias",
        }
    }
}

/// The "email / PDF / no thanks" block shown under an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionPrompt {
    choices: Vec<InteractionChoice>,
}

impl InteractionPrompt {
    pub const QUESTION: &'static str =
        "¿Te gustaría recibir esta información por correo electrónico o descargarla como PDF?";

    pub fn new(email_capable: bool) -> Self {
        let mut choices = Vec::with_capacity(3);
        if email_capable {
            choices.push(InteractionChoice::Email);
        }
        choices.push(InteractionChoice::Pdf);
        choices.push(InteractionChoice::Decline);

        Self { choices }
    }

    pub fn choices(&self) -> &[InteractionChoice] {
        &self.choices
    }

    pub fn offers(&self, choice: InteractionChoice) -> bool {
        self.choices.contains(&choice)
    }
}

impl fmt::Display for InteractionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}", Self::QUESTION)?;
        for choice in &self.choices {
            writeln!(f, "    {:<8} {}", choice.command(), choice.label())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_offered_only_when_capable() {
        let with_email = InteractionPrompt::new(true);
        assert_eq!(
            with_email.choices(),
            &[InteractionChoice::Email, InteractionChoice::Pdf, InteractionChoice::Decline]
        );

        let without_email = InteractionPrompt::new(false);
        assert!(!without_email.offers(InteractionChoice::Email));
        assert_eq!(without_email.choices().len(), 2);
    }

    #[test]
    fn commands_round_trip() {
        for choice in [InteractionChoice::Email, InteractionChoice::Pdf, InteractionChoice::Decline] {
            assert_eq!(InteractionChoice::from_command(choice.command()), Some(choice));
        }
        assert_eq!(InteractionChoice::from_command(" /PDF "), Some(InteractionChoice::Pdf));
        assert_eq!(InteractionChoice::from_command("/help"), None);
    }

    #[test]
    fn rendering_lists_every_choice() {
        let rendered = InteractionPrompt::new(true).to_string();
        assert!(rendered.contains("/email"));
        assert!(rendered.contains("/pdf"));
        assert!(rendered.contains("/no"));
    }
}

/// What the current turn remembers about the last exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    last_question: String,
    last_answer: String,
    awaiting_email_address: bool,
    email_capable: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_question(&self) -> &str {
        &self.last_question
    }

    pub fn last_answer(&self) -> &str {
        &self.last_answer
    }

    pub fn awaiting_email_address(&self) -> bool {
        self.awaiting_email_address
    }

    pub fn email_capable(&self) -> bool {
        self.email_capable
    }

    pub fn record_question(&mut self, question: &str) {
        self.last_question = question.to_string();
    }

    pub fn record_answer(&mut self, answer: &str, email_capable: bool) {
        self.last_answer = answer.to_string();
        self.email_capable = email_capable;
    }

    /// Starts waiting for a recipient address. Refused when there is nothing to send.
    pub fn request_email_address(&mut self) -> bool {
        if self.last_question.is_empty() || self.last_answer.is_empty() {
            return false;
        }
        self.awaiting_email_address = true;
        true
    }

    pub fn stop_awaiting_email(&mut self) {
        self.awaiting_email_address = false;
    }

    /// Forgets the last exchange after a terminal outcome.
    ///
    /// Also drops out of email mode, since there is no longer anything to send.
    pub fn clear_turn(&mut self) {
        self.last_question.clear();
        self.last_answer.clear();
        self.awaiting_email_address = false;
    }
}

use std::io::Write;

use chrono::{Local, NaiveDateTime};
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use eyre::Result;

pub const DEFAULT_ASSISTANT_NAME: &str = "Elendur";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// A single entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub sent_at: NaiveDateTime,
}

/// Identifies one appended entry so it can be taken back out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(u64);

struct Entry {
    handle: MessageHandle,
    message: Message,
}

/// Append-only transcript rendered to a terminal-like writer.
///
/// Entries are never edited. Placeholders ("thinking...", "sending...") are
/// appended with [`ChatLog::append_transient`]: they occupy the current
/// terminal row without a line break, cut to the terminal width, so removing
/// them is a carriage return and a row clear. Any other output settles a
/// showing placeholder onto its own line first, after which removing it only
/// touches the log.
pub struct ChatLog {
    output: Box<dyn Write>,
    entries: Vec<Entry>,
    next_handle: u64,
    assistant_name: String,
    showing_transient: Option<MessageHandle>,
}

impl ChatLog {
    pub fn new(output: Box<dyn Write>) -> Self {
        Self {
            output,
            entries: Vec::new(),
            next_handle: 0,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            showing_transient: None,
        }
    }

    pub fn set_assistant_name(&mut self, name: &str) {
        if !name.trim().is_empty() {
            self.assistant_name = name.trim().to_string();
        }
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    pub fn append(&mut self, sender: Sender, text: &str) -> Result<MessageHandle> {
        self.append_at(sender, text, Local::now().naive_local())
    }

    pub fn append_at(
        &mut self,
        sender: Sender,
        text: &str,
        sent_at: NaiveDateTime,
    ) -> Result<MessageHandle> {
        self.settle()?;

        let message = Message {
            sender,
            text: text.to_string(),
            sent_at,
        };
        let line = format!("{} {}", self.label(&message), message.text);
        writeln!(self.output, "{}", line)?;
        self.output.flush()?;

        Ok(self.push(message))
    }

    /// Appends a placeholder meant to be removed once its request resolves.
    pub fn append_transient(&mut self, sender: Sender, text: &str) -> Result<MessageHandle> {
        self.settle()?;

        let message = Message {
            sender,
            text: text.to_string(),
            sent_at: Local::now().naive_local(),
        };
        let prefix_width = self.label_width(sender);
        let visible = fit_to_width(prefix_width, &message.text);
        let line = format!("{} {}", self.label(&message), visible);
        queue!(self.output, Print("\r"), Print(line))?;
        self.output.flush()?;

        let handle = self.push(message);
        self.showing_transient = Some(handle);
        Ok(handle)
    }

    /// Removes the entry behind `handle`. Returns `false` if it was already gone.
    pub fn remove(&mut self, handle: MessageHandle) -> Result<bool> {
        let Some(index) = self.entries.iter().position(|entry| entry.handle == handle) else {
            return Ok(false);
        };
        self.entries.remove(index);

        if self.showing_transient == Some(handle) {
            self.showing_transient = None;
            queue!(self.output, Print("\r"), Clear(ClearType::CurrentLine))?;
            self.output.flush()?;
        }

        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.settle()?;
        self.entries.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last().map(|entry| &entry.message)
    }

    /// Raw access for text that is not part of the transcript (notices, prompts).
    pub fn output(&mut self) -> Result<&mut dyn Write> {
        self.settle()?;
        Ok(&mut *self.output)
    }

    fn push(&mut self, message: Message) -> MessageHandle {
        let handle = MessageHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(Entry { handle, message });
        handle
    }

    /// Ends the row of a showing placeholder so later output starts on a fresh line.
    fn settle(&mut self) -> Result<()> {
        if self.showing_transient.take().is_some() {
            writeln!(self.output)?;
        }
        Ok(())
    }

    fn label(&self, message: &Message) -> String {
        let time = message.sent_at.format("%H:%M");
        let name = match message.sender {
            Sender::User => "Tú".cyan().bold(),
            Sender::Assistant => self.assistant_name.as_str().green().bold(),
        };
        format!("[{}] {}:", time, name)
    }

    // "[HH:MM] " + name + ": "
    fn label_width(&self, sender: Sender) -> usize {
        let name = match sender {
            Sender::User => "Tú",
            Sender::Assistant => self.assistant_name.as_str(),
        };
        8 + name.chars().count() + 2
    }
}

/// Cuts `text` to one row so a carriage return reaches its start.
fn fit_to_width(prefix_width: usize, text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    match terminal::size() {
        Ok((columns, _)) if columns > 0 => {
            let room = usize::from(columns).saturating_sub(prefix_width + 1);
            first_line.chars().take(room).collect()
        }
        _ => first_line.to_string(),
    }
}

/// In-memory writer shared between a log and a test.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const ERASE_ROW: &str = "\r\u{1b}[2K";

    #[test]
    fn append_keeps_order() {
        let mut log = ChatLog::new(Box::new(io::sink()));
        log.append(Sender::User, "first").unwrap();
        log.append(Sender::Assistant, "second").unwrap();

        let texts: Vec<_> = log.entries().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(log.last().unwrap().sender, Sender::Assistant);
    }

    #[test]
    fn remove_twice_is_a_noop() {
        let mut log = ChatLog::new(Box::new(io::sink()));
        log.append(Sender::User, "question").unwrap();
        let placeholder = log.append_transient(Sender::Assistant, "thinking...").unwrap();
        assert_eq!(log.len(), 2);

        assert!(log.remove(placeholder).unwrap());
        assert_eq!(log.len(), 1);

        assert!(!log.remove(placeholder).unwrap());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn remove_only_touches_its_own_entry() {
        let mut log = ChatLog::new(Box::new(io::sink()));
        let first = log.append(Sender::User, "a").unwrap();
        log.append(Sender::Assistant, "b").unwrap();

        log.remove(first).unwrap();

        let texts: Vec<_> = log.entries().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["b"]);
    }

    #[test]
    fn placeholder_stays_on_one_row_until_removed() {
        let buffer = SharedBuffer::default();
        let mut log = ChatLog::new(Box::new(buffer.clone()));
        let placeholder = log.append_transient(Sender::Assistant, "thinking...").unwrap();

        let shown = buffer.contents();
        assert!(shown.starts_with('\r'));
        assert!(!shown.contains('\n'));

        log.remove(placeholder).unwrap();

        let after = buffer.contents();
        assert_eq!(after, format!("{}{}", shown, ERASE_ROW));
        assert!(!after.contains("\u{1b}[1A"));
    }

    #[test]
    fn output_after_placeholder_keeps_screen_intact() {
        let buffer = SharedBuffer::default();
        let mut log = ChatLog::new(Box::new(buffer.clone()));
        let placeholder = log.append_transient(Sender::Assistant, "thinking...").unwrap();
        writeln!(log.output().unwrap(), "notice").unwrap();
        let before = buffer.contents();
        assert!(before.ends_with("\nnotice\n"));

        log.remove(placeholder).unwrap();

        assert_eq!(buffer.contents(), before);
        assert!(log.is_empty());
    }

    #[test]
    fn removing_an_older_entry_keeps_placeholder_erasable() {
        let buffer = SharedBuffer::default();
        let mut log = ChatLog::new(Box::new(buffer.clone()));
        let older = log.append(Sender::User, "question").unwrap();
        let placeholder = log.append_transient(Sender::Assistant, "thinking...").unwrap();

        log.remove(older).unwrap();
        log.remove(placeholder).unwrap();

        assert!(buffer.contents().ends_with(ERASE_ROW));
    }

    #[test]
    fn multi_line_placeholder_shows_only_first_line() {
        let buffer = SharedBuffer::default();
        let mut log = ChatLog::new(Box::new(buffer.clone()));

        log.append_transient(Sender::Assistant, "uno\ndos").unwrap();

        assert!(!buffer.contents().contains("dos"));
        assert_eq!(log.last().unwrap().text, "uno\ndos");
    }

    #[test]
    fn assistant_name_ignores_blank_values() {
        let mut log = ChatLog::new(Box::new(io::sink()));
        log.set_assistant_name("  ");
        assert_eq!(log.assistant_name(), DEFAULT_ASSISTANT_NAME);

        log.set_assistant_name("Mithrandir");
        assert_eq!(log.assistant_name(), "Mithrandir");
    }
}

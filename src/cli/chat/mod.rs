pub mod chat_log;
pub mod conversation_state;
pub mod email_address;
pub mod interaction;
pub mod prompt;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chat_log::{ChatLog, Sender};
use chrono::Local;
use color_print::{cformat, cstr};
use conversation_state::ConversationState;
use email_address::is_valid_email;
use eyre::Result;
use interaction::{InteractionChoice, InteractionPrompt};
use prompt::{InputMode, generate_prompt};
use rustyline::error::ReadlineError;
use tracing::{debug, error, info, warn};

use crate::elendur_client::{Backend, PdfDocument, TransportError};

/// File name every generated PDF is saved under.
pub const PDF_FILENAME: &str = "consulta_Elendur.pdf";

const WELCOME_TEXT: &str = cstr!(
    "
<bold>Hola, soy Elendur.</bold> Pregúntame lo que quieras sobre la Tierra Media.

Cuando una respuesta pueda guardarse te ofreceré enviarla por correo
o descargarla como PDF.

<dim>/help         Muestra la ayuda
/quit         Sale de la aplicación</dim>
"
);

const HELP_TEXT: &str = cstr!(
    "
<bold>Elendur Chat</bold>

/email        Envía la última respuesta por correo electrónico
/pdf          Descarga la última respuesta como PDF
/no           Descarta las opciones de envío
/clear        Borra la conversación
/help         Muestra esta ayuda
/quit         Sale de la aplicación
"
);

const EMPTY_INPUT_NOTICE: &str = "Por favor, introduce texto antes de enviar.";
const NOTHING_PENDING_NOTICE: &str = "Esa opción no está disponible ahora mismo.";

const THINKING_TEXT: &str = "Elendur está pensando...";
const CHAT_FALLBACK_DETAIL: &str = "No se pudo obtener una respuesta.";
const CHAT_CONNECTION_ERROR: &str = "Error de conexión. No se pudo contactar al asistente.";

const ASK_FOR_EMAIL_TEXT: &str =
    "Por favor, introduce la dirección de correo electrónico a la que quieres que envíe la respuesta.";
const INVALID_EMAIL_TEXT: &str =
    "El formato del correo electrónico no es válido. Por favor, verifica e inténtalo de nuevo.";
const EMAIL_CONNECTION_ERROR: &str = "Error de conexión. No se pudo enviar el correo.";

const GENERATING_PDF_TEXT: &str = "Generando tu documento PDF, por favor espera...";
const PDF_CONNECTION_ERROR: &str = "Error de conexión. No se pudo generar el PDF.";

const DELIVERY_FALLBACK_DETAIL: &str = "Hubo un problema.";
const DECLINE_TEXT: &str = "De acuerdo, no se realizará ninguna acción adicional con esta respuesta.";

/// Shared view of whether a network call is outstanding.
#[derive(Debug, Clone, Default)]
pub struct BusyIndicator(Arc<AtomicBool>);

impl BusyIndicator {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, busy: bool) {
        self.0.store(busy, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingEmail,
    Busy,
}

/// How a submitted line or prompt choice was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// A request was already outstanding; nothing happened.
    Ignored,
    /// Empty input; the blocking notice was shown.
    Notice,
    /// The typed recipient address was malformed; still waiting for one.
    InvalidEmail,
    /// The chosen follow-up is not on offer.
    Unavailable,
    /// The request was made but failed; the error is in the log.
    Failed,
    /// The line or choice was handled to the end.
    Completed,
}

pub struct ChatContext {
    input: Option<String>,
    interactive: bool,
    backend: Arc<dyn Backend>,
    download_dir: PathBuf,
    conversation_state: ConversationState,
    chat_log: ChatLog,
    interaction: Option<InteractionPrompt>,
    busy: BusyIndicator,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        backend: Arc<dyn Backend>,
        download_dir: PathBuf,
        input: Option<String>,
        interactive: bool,
    ) -> Self {
        Self {
            input,
            interactive,
            backend,
            download_dir,
            conversation_state: ConversationState::new(),
            chat_log: ChatLog::new(output),
            interaction: None,
            busy: BusyIndicator::default(),
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Non-interactive mode (single question)
        if let Some(input) = self.input.take() {
            let turn = self.submit(&input).await?;
            return Ok(match turn {
                Turn::Completed => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            });
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    pub fn state(&self) -> ControllerState {
        if self.busy.is_busy() {
            ControllerState::Busy
        } else if self.conversation_state.awaiting_email_address() {
            ControllerState::AwaitingEmail
        } else {
            ControllerState::Idle
        }
    }

    pub fn input_mode(&self) -> InputMode {
        if self.conversation_state.awaiting_email_address() {
            InputMode::EmailAddress
        } else {
            InputMode::Question
        }
    }

    pub fn busy_indicator(&self) -> BusyIndicator {
        self.busy.clone()
    }

    pub fn interaction(&self) -> Option<&InteractionPrompt> {
        self.interaction.as_ref()
    }

    pub fn conversation_state(&self) -> &ConversationState {
        &self.conversation_state
    }

    pub fn chat_log(&self) -> &ChatLog {
        &self.chat_log
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.chat_log.output()?, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            debug!(state = ?self.state(), "Waiting for input");
            let prompt_text = generate_prompt(self.input_mode());

            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if line.trim() == "/quit" {
                        break;
                    }

                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str());
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        error!("Failed to handle input: {}", e);
                        writeln!(self.chat_log.output()?, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.chat_log.output()?, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<Turn> {
        match input.trim() {
            "/help" => {
                writeln!(self.chat_log.output()?, "{}", HELP_TEXT)?;
                Ok(Turn::Completed)
            }
            "/clear" => {
                if self.busy.is_busy() {
                    return Ok(Turn::Ignored);
                }
                debug!("Clearing {} log entries", self.chat_log.len());
                self.conversation_state = ConversationState::new();
                self.interaction = None;
                self.chat_log.clear()?;
                writeln!(self.chat_log.output()?, "Conversación borrada.")?;
                Ok(Turn::Completed)
            }
            command => match InteractionChoice::from_command(command) {
                Some(choice) => self.choose(choice).await,
                None => self.submit(input).await,
            },
        }
    }

    /// Routes one line of user text to the pending email request or a new question.
    pub async fn submit(&mut self, raw: &str) -> Result<Turn> {
        if self.busy.is_busy() {
            warn!("Ignoring submission while a request is outstanding");
            return Ok(Turn::Ignored);
        }

        let text = raw.trim();
        if text.is_empty() {
            self.show_notice(EMPTY_INPUT_NOTICE)?;
            return Ok(Turn::Notice);
        }

        if self.conversation_state.awaiting_email_address() {
            return self.submit_email_address(text).await;
        }

        self.submit_question(text).await
    }

    /// Single dispatch point for the follow-up prompt.
    pub async fn choose(&mut self, choice: InteractionChoice) -> Result<Turn> {
        if self.busy.is_busy() {
            warn!("Ignoring {:?} while a request is outstanding", choice);
            return Ok(Turn::Ignored);
        }

        let offered = self
            .interaction
            .as_ref()
            .map_or(false, |prompt| prompt.offers(choice));
        if !offered {
            self.show_notice(NOTHING_PENDING_NOTICE)?;
            return Ok(Turn::Unavailable);
        }

        debug!("Interaction choice: {:?}", choice);

        match choice {
            InteractionChoice::Email => {
                if !self.conversation_state.request_email_address() {
                    self.show_notice(NOTHING_PENDING_NOTICE)?;
                    return Ok(Turn::Unavailable);
                }
                self.interaction = None;
                self.chat_log.append(Sender::Assistant, ASK_FOR_EMAIL_TEXT)?;
            }
            InteractionChoice::Pdf => {
                self.interaction = None;
                self.busy.set(true);
                let outcome = self.deliver_pdf().await;
                self.restore_idle();
                if !outcome? {
                    return Ok(Turn::Failed);
                }
            }
            InteractionChoice::Decline => {
                self.interaction = None;
                self.chat_log.append(Sender::Assistant, DECLINE_TEXT)?;
                self.conversation_state.clear_turn();
                self.restore_idle();
            }
        }

        Ok(Turn::Completed)
    }

    async fn submit_question(&mut self, question: &str) -> Result<Turn> {
        self.interaction = None;
        self.chat_log.append(Sender::User, question)?;
        self.conversation_state.record_question(question);

        self.busy.set(true);
        let outcome = self.ask(question).await;
        self.busy.set(false);

        Ok(if outcome? { Turn::Completed } else { Turn::Failed })
    }

    async fn ask(&mut self, question: &str) -> Result<bool> {
        let placeholder = self.chat_log.append_transient(Sender::Assistant, THINKING_TEXT)?;
        let result = self.backend.ask_question(question).await;
        self.chat_log.remove(placeholder)?;

        match result {
            Ok(reply) => {
                info!(
                    email_capable = reply.email_capable,
                    offer_download = reply.offer_download,
                    "Question answered"
                );

                if let Some(name) = &reply.assistant_name {
                    self.chat_log.set_assistant_name(name);
                }
                let sent_at = reply.timestamp.unwrap_or_else(|| Local::now().naive_local());
                self.chat_log.append_at(Sender::Assistant, &reply.reply, sent_at)?;
                self.conversation_state.record_answer(&reply.reply, reply.email_capable);

                // A one-shot run exits before any choice could be made
                if reply.offer_download && self.interactive {
                    self.open_interaction()?;
                }
                Ok(true)
            }
            Err(err) => {
                warn!("Question failed: {}", err);
                let text = failure_text(&err, "Error:", CHAT_FALLBACK_DETAIL, CHAT_CONNECTION_ERROR);
                self.chat_log.append(Sender::Assistant, &text)?;
                self.conversation_state.clear_turn();
                Ok(false)
            }
        }
    }

    async fn submit_email_address(&mut self, address: &str) -> Result<Turn> {
        self.chat_log.append(Sender::User, address)?;

        if !is_valid_email(address) {
            debug!("Rejected malformed email address");
            self.chat_log.append(Sender::Assistant, INVALID_EMAIL_TEXT)?;
            return Ok(Turn::InvalidEmail);
        }

        self.busy.set(true);
        let outcome = self.deliver_email(address).await;
        self.restore_idle();

        Ok(if outcome? { Turn::Completed } else { Turn::Failed })
    }

    async fn deliver_email(&mut self, address: &str) -> Result<bool> {
        let subject = format!(
            "Información sobre \"{}\" de Elendur",
            self.conversation_state.last_question()
        );
        let body = self.conversation_state.last_answer().to_string();

        let placeholder = self
            .chat_log
            .append_transient(Sender::Assistant, &format!("Intentando enviar el correo a {}...", address))?;
        let result = self.backend.send_email(address, &body, Some(&subject)).await;
        self.chat_log.remove(placeholder)?;

        match result {
            Ok(ack) => {
                info!(message = ?ack.message, success = ?ack.success, "Answer emailed");
                self.chat_log.append(
                    Sender::Assistant,
                    &format!("¡Listo! He enviado la información a {}.", address),
                )?;
                self.conversation_state.clear_turn();
                Ok(true)
            }
            Err(err) => {
                warn!("Email delivery failed: {}", err);
                let prefix = format!("Lo siento, no pude enviar el correo a {}. Error:", address);
                let text = failure_text(&err, &prefix, DELIVERY_FALLBACK_DETAIL, EMAIL_CONNECTION_ERROR);
                self.chat_log.append(Sender::Assistant, &text)?;
                Ok(false)
            }
        }
    }

    async fn deliver_pdf(&mut self) -> Result<bool> {
        let question = self.conversation_state.last_question().to_string();
        let answer = self.conversation_state.last_answer().to_string();

        let placeholder = self.chat_log.append_transient(Sender::Assistant, GENERATING_PDF_TEXT)?;
        let result = self.backend.request_pdf(&question, &answer).await;
        self.chat_log.remove(placeholder)?;

        match result {
            Ok(document) => match self.save_pdf(&document).await {
                Ok(path) => {
                    info!("Saved PDF to {}", path.display());
                    self.chat_log.append(
                        Sender::Assistant,
                        &format!("¡Listo! Tu PDF ha sido generado y guardado en {}.", path.display()),
                    )?;
                    self.conversation_state.clear_turn();
                    Ok(true)
                }
                Err(e) => {
                    error!("Failed to save PDF: {}", e);
                    self.chat_log.append(
                        Sender::Assistant,
                        &format!("Lo siento, no pude guardar el PDF. Error: {}", e),
                    )?;
                    Ok(false)
                }
            },
            Err(err) => {
                warn!("PDF generation failed: {}", err);
                let text = failure_text(
                    &err,
                    "Lo siento, no pude generar el PDF. Error:",
                    DELIVERY_FALLBACK_DETAIL,
                    PDF_CONNECTION_ERROR,
                );
                self.chat_log.append(Sender::Assistant, &text)?;
                Ok(false)
            }
        }
    }

    async fn save_pdf(&self, document: &PdfDocument) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(PDF_FILENAME);
        tokio::fs::write(&path, &document.bytes).await?;
        Ok(path)
    }

    fn open_interaction(&mut self) -> Result<()> {
        let prompt = InteractionPrompt::new(self.conversation_state.email_capable());
        write!(self.chat_log.output()?, "{}", prompt)?;
        self.interaction = Some(prompt);
        Ok(())
    }

    fn restore_idle(&mut self) {
        self.busy.set(false);
        self.conversation_state.stop_awaiting_email();
    }

    fn show_notice(&mut self, text: &str) -> Result<()> {
        writeln!(
            self.chat_log.output()?,
            "{}",
            cformat!("<yellow><bold>[Mensaje]</bold></yellow> {}", text)
        )?;
        Ok(())
    }
}

fn failure_text(err: &TransportError, prefix: &str, fallback: &str, connection_error: &str) -> String {
    match err {
        TransportError::ServerRejected { .. } => {
            format!("{} {}", prefix, err.detail().unwrap_or(fallback))
        }
        TransportError::ConnectionFailure(_) => connection_error.to_string(),
    }
}

use mcpchat_llm::{Provider, ProviderError, create_transport};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::chat::{
    ChatSession, ChatSessionError, ChatSessionHandle, ChatSnapshot, MessageId, MessageStatus, Role,
    SubmissionController,
};
use crate::settings::SettingsStore;

pub const HELP_TEXT: &str = "\
commands:
  /new              start a new chat
  /stop             stop the reply being streamed
  /provider <name>  switch to gemini, openai or claude
  /help             show this help
  /quit             exit
anything else is sent as a question
";

const REPLY_PREFIX: &str = "assistant> ";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    NewChat,
    Stop,
    SelectProvider(Provider),
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("unknown command `/{name}`, try /help"))]
    UnknownCommand { name: String },
    #[snafu(display("usage: /provider <gemini|openai|claude>"))]
    MissingProviderName,
    #[snafu(display("{source}"))]
    InvalidProvider { source: ProviderError },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to create stream transport: {source}"))]
    CreateTransport { source: ProviderError },
    #[snafu(display("failed to read terminal input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write terminal output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("{source}"))]
    Session { source: ChatSessionError },
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Command::Submit(line.to_string()));
    };

    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "new" => Ok(Command::NewChat),
        "stop" => Ok(Command::Stop),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "provider" => {
            if argument.is_empty() {
                return MissingProviderNameSnafu.fail();
            }
            let provider = argument
                .parse::<Provider>()
                .context(InvalidProviderSnafu)?;
            Ok(Command::SelectProvider(provider))
        }
        _ => UnknownCommandSnafu { name }.fail(),
    }
}

#[derive(Debug, Clone)]
struct RenderedReply {
    id: MessageId,
    printed: String,
}

/// Turns successive snapshots into incremental terminal output.
///
/// Only assistant replies are printed; the user already sees what they typed.
#[derive(Debug, Default)]
pub struct TranscriptRenderer {
    current: Option<RenderedReply>,
    last_finished: Option<MessageId>,
    printed_any: bool,
}

impl TranscriptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &ChatSnapshot) -> String {
        let mut output = String::new();

        if snapshot.messages.is_empty() {
            if std::mem::take(&mut self.printed_any) {
                if self.current.take().is_some() {
                    output.push('\n');
                }
                output.push_str("-- new chat --\n");
            }
            return output;
        }

        for message in snapshot
            .messages
            .iter()
            .filter(|message| message.role == Role::Assistant)
        {
            if self.last_finished.is_some_and(|finished| message.id <= finished) {
                continue;
            }

            let reply = match self.current.take() {
                Some(reply) if reply.id == message.id => reply,
                _ => {
                    output.push_str(REPLY_PREFIX);
                    self.printed_any = true;
                    RenderedReply {
                        id: message.id,
                        printed: String::new(),
                    }
                }
            };

            match message.content.strip_prefix(reply.printed.as_str()) {
                Some(rest) => output.push_str(rest),
                // Content was replaced rather than extended.
                None => {
                    output.push('\n');
                    output.push_str(&message.content);
                }
            }

            match &message.status {
                MessageStatus::Pending | MessageStatus::Streaming(_) => {
                    self.current = Some(RenderedReply {
                        id: message.id,
                        printed: message.content.clone(),
                    });
                    continue;
                }
                MessageStatus::Done | MessageStatus::Error(_) => output.push('\n'),
                MessageStatus::Cancelled => output.push_str(" [stopped]\n"),
            }
            self.last_finished = Some(message.id);
        }

        output
    }
}

/// Runs the line-based chat loop until `/quit` or end of input.
pub async fn run_terminal(settings_store: SettingsStore) -> Result<(), AppError> {
    let settings = settings_store.settings();
    let transport =
        create_transport(settings.to_endpoint_config()).context(CreateTransportSnafu)?;
    let controller = SubmissionController::new(transport, settings.provider);
    let (session, handle) = ChatSession::new(controller);
    let session_task = tokio::spawn(session.run());
    let render_task = tokio::spawn(render_snapshots(handle.clone()));

    write_out(&format!(
        "connected to {} using {}\n{HELP_TEXT}",
        settings.to_endpoint_config().base_url(),
        settings.provider.display_name()
    ))
    .await?;

    let result = read_commands(&handle, &settings_store).await;

    let _ = handle.quit();
    if let Err(error) = session_task.await {
        tracing::error!(error = %error, "chat session task failed");
    }
    match render_task.await {
        Ok(rendered) => rendered?,
        Err(error) => tracing::error!(error = %error, "render task failed"),
    }

    result
}

async fn read_commands(
    handle: &ChatSessionHandle,
    settings_store: &SettingsStore,
) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context(ReadInputSnafu {
        stage: "read-stdin-line",
    })? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(error) => {
                write_out(&format!("{error}\n")).await?;
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Submit(text) => handle.submit(text).context(SessionSnafu)?,
            Command::NewChat => handle.new_chat().context(SessionSnafu)?,
            Command::Stop => handle.stop().context(SessionSnafu)?,
            Command::SelectProvider(provider) => {
                handle.select_provider(provider).context(SessionSnafu)?;
                if let Err(error) = settings_store.remember_provider(provider) {
                    tracing::warn!(error = %error, "failed to remember provider");
                }
                write_out(&format!("provider: {}\n", provider.display_name())).await?;
            }
            Command::Help => write_out(HELP_TEXT).await?,
            Command::Quit => break,
        }
    }

    Ok(())
}

async fn render_snapshots(handle: ChatSessionHandle) -> Result<(), AppError> {
    let mut snapshots = handle.subscribe();
    drop(handle);
    let mut renderer = TranscriptRenderer::new();

    loop {
        let output = renderer.render(&snapshots.borrow_and_update());
        if !output.is_empty() {
            write_out(&output).await?;
        }
        if snapshots.changed().await.is_err() {
            return Ok(());
        }
    }
}

async fn write_out(text: &str) -> Result<(), AppError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await.context(WriteOutputSnafu {
        stage: "write-stdout",
    })?;
    stdout.flush().await.context(WriteOutputSnafu {
        stage: "flush-stdout",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Message, StreamSessionId};
    use crate::chat::TRANSPORT_FAILURE_MESSAGE;

    fn reply(id: u64, content: &str, status: MessageStatus) -> Message {
        Message::new(MessageId::new(id), Role::Assistant, content, status)
    }

    fn snapshot(messages: Vec<Message>) -> ChatSnapshot {
        ChatSnapshot {
            messages,
            ..ChatSnapshot::default()
        }
    }

    fn streaming() -> MessageStatus {
        MessageStatus::Streaming(StreamSessionId::new(1))
    }

    #[test]
    fn parses_commands_and_questions() {
        assert_eq!(parse_command("   ").ok(), Some(Command::Empty));
        assert_eq!(
            parse_command("  what is MCP? ").ok(),
            Some(Command::Submit("what is MCP?".into()))
        );
        assert_eq!(parse_command("/new").ok(), Some(Command::NewChat));
        assert_eq!(parse_command("/STOP").ok(), Some(Command::Stop));
        assert_eq!(parse_command("/exit").ok(), Some(Command::Quit));
        assert_eq!(
            parse_command("/provider  Claude ").ok(),
            Some(Command::SelectProvider(Provider::Claude))
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(matches!(
            parse_command("/provider"),
            Err(CommandError::MissingProviderName)
        ));
        assert!(matches!(
            parse_command("/provider mistral"),
            Err(CommandError::InvalidProvider { .. })
        ));
        assert!(matches!(
            parse_command("/frobnicate now"),
            Err(CommandError::UnknownCommand { name }) if name == "frobnicate"
        ));
    }

    #[test]
    fn prints_only_new_text() {
        let mut renderer = TranscriptRenderer::new();
        let user = Message::user(MessageId::new(1), "hi");

        assert_eq!(
            renderer.render(&snapshot(vec![user.clone(), reply(2, "", streaming())])),
            "assistant> "
        );
        assert_eq!(
            renderer.render(&snapshot(vec![user.clone(), reply(2, "Hel", streaming())])),
            "Hel"
        );
        assert_eq!(
            renderer.render(&snapshot(vec![user.clone(), reply(2, "Hello", MessageStatus::Done)])),
            "lo\n"
        );
        assert_eq!(
            renderer.render(&snapshot(vec![user, reply(2, "Hello", MessageStatus::Done)])),
            ""
        );
    }

    #[test]
    fn replaced_content_is_reprinted() {
        let mut renderer = TranscriptRenderer::new();
        renderer.render(&snapshot(vec![reply(2, "Hel", streaming())]));

        let output = renderer.render(&snapshot(vec![reply(
            2,
            TRANSPORT_FAILURE_MESSAGE,
            MessageStatus::Error("reset".into()),
        )]));
        assert_eq!(output, format!("\n{TRANSPORT_FAILURE_MESSAGE}\n"));
    }

    #[test]
    fn superseded_reply_is_closed_before_the_next() {
        let mut renderer = TranscriptRenderer::new();
        renderer.render(&snapshot(vec![reply(2, "par", streaming())]));

        let output = renderer.render(&snapshot(vec![
            reply(2, "par", MessageStatus::Cancelled),
            reply(4, "", streaming()),
        ]));
        assert_eq!(output, " [stopped]\nassistant> ");
    }

    #[test]
    fn new_chat_prints_a_separator_once() {
        let mut renderer = TranscriptRenderer::new();
        assert_eq!(renderer.render(&snapshot(Vec::new())), "");

        renderer.render(&snapshot(vec![reply(2, "Hel", streaming())]));
        assert_eq!(renderer.render(&snapshot(Vec::new())), "\n-- new chat --\n");
        assert_eq!(renderer.render(&snapshot(Vec::new())), "");

        assert_eq!(
            renderer.render(&snapshot(vec![reply(6, "Hi", MessageStatus::Done)])),
            "assistant> Hi\n"
        );
    }
}

//! Informational chat commands.

use std::sync::Arc;

use async_trait::async_trait;
use starbridge_core::{CommandDispatcher, CommandError, CommandSpec, Plugin, SessionHandle};
use starbridge_proto::{Packet, Value};

/// `/help` and `/about`.
pub struct InfoCommands {
    commands: Arc<CommandDispatcher>,
}

impl InfoCommands {
    /// Plugin over the live command table.
    pub fn new(commands: Arc<CommandDispatcher>) -> Self {
        Self { commands }
    }

    /// Whitespace-split arguments after the command token.
    fn args(packet: &Packet) -> Vec<String> {
        packet
            .parsed
            .as_ref()
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .map(|text| text.split_whitespace().skip(1).map(str::to_owned).collect())
            .unwrap_or_default()
    }

    async fn help(
        &self,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<(), CommandError> {
        let args = Self::args(packet);
        match args.first() {
            None => {
                let names = self.commands.names().join(", ");
                session.send_message(&format!("Available commands: {names}")).await?;
            },
            Some(name) => match self.commands.spec(name) {
                Some(spec) => {
                    let mut line = format!("{}{}", self.commands.prefix(), spec.name);
                    if !spec.syntax.is_empty() {
                        line.push_str(&format!(" {}", spec.syntax));
                    }
                    if !spec.doc.is_empty() {
                        line.push_str(&format!(": {}", spec.doc));
                    }
                    session.send_message(&line).await?;
                },
                None => {
                    session.send_message(&format!("No such command: {name}")).await?;
                },
            },
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for InfoCommands {
    fn name(&self) -> &str {
        "info_commands"
    }

    fn description(&self) -> &str {
        "Informational commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("help")
                .doc("Display helpful information on commands.")
                .syntax("(command)"),
            CommandSpec::new("about").doc("Show information about this server."),
        ]
    }

    async fn command(
        &self,
        name: &str,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<(), CommandError> {
        match name {
            "help" => self.help(packet, session).await,
            "about" => {
                session
                    .send_message("This server runs the Starbridge proxy.")
                    .await?;
                Ok(())
            },
            other => Err(CommandError::Failure(format!("unknown command {other}"))),
        }
    }
}

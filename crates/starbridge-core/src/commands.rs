//! Chat-command dispatch.
//!
//! Registered as a single high-priority hook on the chat-sent type. Lines
//! starting with the configured prefix never reach the upstream server:
//! known commands run, unknown ones get a reply, and the forward bit is
//! cleared either way.

use std::{collections::HashMap, sync::Arc, sync::Mutex, sync::PoisonError};

use async_trait::async_trait;
use starbridge_proto::{Packet, PacketType, Value};

use crate::{
    errors::{CommandError, PluginError},
    plugin::{CommandSpec, HookSpec, Plugin},
    session::SessionHandle,
};

#[derive(Clone)]
struct CommandEntry {
    spec: CommandSpec,
    plugin: Arc<dyn Plugin>,
}

/// Command table plus the chat-sent hook that drives it.
pub struct CommandDispatcher {
    prefix: String,
    commands: Mutex<HashMap<String, CommandEntry>>,
}

impl CommandDispatcher {
    /// Dispatcher with the configured command prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), commands: Mutex::new(HashMap::new()) }
    }

    /// The configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register every command a plugin exposes, aliases included.
    pub fn register_plugin(&self, plugin: &Arc<dyn Plugin>) {
        for spec in plugin.commands() {
            self.register(spec, Arc::clone(plugin));
        }
    }

    /// Register one command, then each of its aliases.
    ///
    /// Conflicts: the higher priority wins and the loser is logged;
    /// aliases never displace an existing registration.
    pub fn register(&self, spec: CommandSpec, plugin: Arc<dyn Plugin>) {
        let name = spec.name.to_lowercase();
        self.install(name, spec.clone(), Arc::clone(&plugin), false);
        for alias in &spec.aliases {
            self.install(alias.to_lowercase(), spec.clone(), Arc::clone(&plugin), true);
        }
    }

    fn install(&self, name: String, spec: CommandSpec, plugin: Arc<dyn Plugin>, is_alias: bool) {
        let mut commands = self.lock();
        match commands.get(&name) {
            Some(existing) => {
                if !is_alias && spec.priority >= existing.spec.priority {
                    tracing::warn!(
                        command = %name,
                        winner = plugin.name(),
                        loser = existing.plugin.name(),
                        "command registration overwrites an existing command"
                    );
                    commands.insert(name, CommandEntry { spec, plugin });
                } else {
                    tracing::warn!(
                        command = %name,
                        winner = existing.plugin.name(),
                        loser = plugin.name(),
                        "command registration lost a conflict"
                    );
                }
            },
            None => {
                tracing::debug!(command = %name, plugin = plugin.name(), "registered command");
                commands.insert(name, CommandEntry { spec, plugin });
            },
        }
    }

    /// Sorted primary and alias names currently registered.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Spec registered under `name` (primary or alias).
    pub fn spec(&self, name: &str) -> Option<CommandSpec> {
        self.lock().get(&name.to_lowercase()).map(|e| e.spec.clone())
    }

    fn lookup(&self, name: &str) -> Option<CommandEntry> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CommandEntry>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_command(
        &self,
        entry: CommandEntry,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<(), PluginError> {
        let held = session.permissions();
        if !entry.spec.perms.iter().all(|perm| held.contains(perm)) {
            session
                .send_message("You do not have permission to use this command.")
                .await?;
            return Ok(());
        }

        match entry.plugin.command(&entry.spec.name, packet, session).await {
            Ok(()) => Ok(()),
            Err(CommandError::Syntax(msg)) => {
                let err = if msg.is_empty() { "Invalid syntax.".to_owned() } else { msg };
                if entry.spec.syntax.is_empty() {
                    session.send_message(&err).await
                } else {
                    session
                        .send_message(&format!(
                            "{err}\nSyntax: {}{} {}.",
                            self.prefix, entry.spec.name, entry.spec.syntax
                        ))
                        .await
                }
            },
            Err(CommandError::PermissionDenied(detail)) => {
                let suffix =
                    if detail.is_empty() { String::new() } else { format!("\n{detail}") };
                session
                    .send_message(&format!(
                        "You do not have permission to use this command.{suffix}"
                    ))
                    .await
            },
            Err(CommandError::Failure(msg)) => {
                tracing::error!(
                    command = %entry.spec.name,
                    plugin = entry.plugin.name(),
                    error = %msg,
                    "exception occurred in command"
                );
                session.send_message("Error occurred while running command.").await
            },
        }
    }
}

#[async_trait]
impl Plugin for CommandDispatcher {
    fn name(&self) -> &str {
        "command_dispatcher"
    }

    fn description(&self) -> &str {
        "Routes prefixed chat lines to plugin commands."
    }

    fn hooks(&self) -> Vec<HookSpec> {
        vec![HookSpec::with_priority(PacketType::ChatSent, 99)]
    }

    async fn handle(
        &self,
        packet: &mut Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        let command = {
            let Some(parsed) = packet.parsed.as_ref() else {
                return Ok(true);
            };
            let Some(text) = parsed.get("text").and_then(Value::as_str) else {
                return Ok(true);
            };
            if !text.starts_with(self.prefix.as_str()) {
                return Ok(true);
            }
            let stripped = &text[self.prefix.len()..];
            let Some(token) = stripped.split_whitespace().next() else {
                // a bare prefix is not a command
                return Ok(true);
            };
            token.to_lowercase()
        };

        match self.lookup(&command) {
            Some(entry) => {
                self.run_command(entry, packet, session).await?;
            },
            None => {
                session
                    .send_message(&format!(
                        "Command {command} does not exist. Try {}help for a list of commands.",
                        self.prefix
                    ))
                    .await?;
            },
        }
        Ok(false)
    }
}

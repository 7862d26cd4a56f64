mod suggest;

use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::core::remote::RemoteGateway;
use crate::core::store::DataStore;
use crate::core::store::types::AgentKind;

/// Reserved addressee for broadcasts to every registered agent.
pub const BROADCAST_ID: &str = "all";
/// Reserved addressee for meta-operations on the console itself.
pub const SYSTEM_ID: &str = "system";

pub const BROADCAST_ACTIONS: &[&str] = &["status", "pause", "resume", "help"];
pub const SYSTEM_ACTIONS: &[&str] = &["settings", "help", "clear", "sync"];

/// Static allow-list of actions per agent kind.
pub fn actions_for_kind(kind: AgentKind) -> &'static [&'static str] {
    match kind {
        AgentKind::Research => &["search", "analyze", "summarize", "status", "pause", "resume"],
        AgentKind::Assistant => &["help", "schedule", "remind", "status", "pause", "resume"],
        AgentKind::Analysis => &["analyze", "report", "chart", "status", "pause", "resume"],
        AgentKind::Creative => &["write", "design", "brainstorm", "status", "pause", "resume"],
        AgentKind::Code => &["review", "debug", "refactor", "status", "pause", "resume"],
        AgentKind::Custom => &["status", "pause", "resume"],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub raw: String,
    pub agent: String,
    pub action: String,
    pub params: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub valid: bool,
    pub message: String,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    fn fail(message: String) -> Self {
        Self {
            valid: false,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub accepted: bool,
    pub message: String,
}

pub struct CommandProcessor {
    store: Arc<DataStore>,
    remote: Arc<dyn RemoteGateway>,
}

impl CommandProcessor {
    pub fn new(store: Arc<DataStore>, remote: Arc<dyn RemoteGateway>) -> Self {
        Self { store, remote }
    }

    /// Parse a raw line against the `@<agent> <action> [params]` grammar.
    /// Anything that does not match exactly is rejected as a whole.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let trimmed = text.trim();
        let re = Regex::new(r"^@([A-Za-z0-9_]+)[ \t]+(\S+)(?:[ \t]+(.+))?$").unwrap();
        let caps = re.captures(trimmed)?;
        Some(Command {
            raw: trimmed.to_string(),
            agent: caps[1].to_string(),
            action: caps[2].to_string(),
            params: caps.get(3).map(|m| m.as_str().trim().to_string()),
        })
    }

    /// Check the addressee and action against the registry and the static
    /// allow-lists. Failures come back as user-facing messages, never errors.
    pub async fn validate(&self, command: &Command) -> Validation {
        let action = command.action.as_str();
        match command.agent.as_str() {
            BROADCAST_ID => {
                if BROADCAST_ACTIONS.contains(&action) {
                    Validation::ok()
                } else {
                    Validation::fail(format!(
                        "invalid action '{}' for @all (supported: {})",
                        action,
                        BROADCAST_ACTIONS.join(", ")
                    ))
                }
            }
            SYSTEM_ID => {
                if SYSTEM_ACTIONS.contains(&action) {
                    Validation::ok()
                } else {
                    Validation::fail(format!(
                        "invalid action '{}' for @system (supported: {})",
                        action,
                        SYSTEM_ACTIONS.join(", ")
                    ))
                }
            }
            id => match self.store.agent(id).await {
                None => Validation::fail(format!("unknown agent '@{}'", id)),
                Some(agent) => {
                    let allowed = actions_for_kind(agent.kind);
                    if allowed.contains(&action) {
                        Validation::ok()
                    } else {
                        Validation::fail(format!(
                            "invalid action '{}' for agent '{}' ({} agents support: {})",
                            action,
                            agent.id,
                            agent.kind.as_str(),
                            allowed.join(", ")
                        ))
                    }
                }
            },
        }
    }

    /// Run a validated command. The raw text is recorded into history before
    /// the simulated round trip, so history order is submission order. Once a
    /// command validates there is no failure path; the round trip exists only
    /// to inject latency.
    pub async fn execute(&self, command: &Command) -> Result<String> {
        self.store.append_history(&command.raw).await?;

        if let Err(e) = self.remote.round_trip("command").await {
            debug!("simulated command round trip reported '{}', ignored", e);
        }

        match command.agent.as_str() {
            BROADCAST_ID => self.execute_broadcast(command).await,
            SYSTEM_ID => self.execute_system(command).await,
            _ => Ok(Self::agent_result(command)),
        }
    }

    /// Parse, validate, and execute in one step; the entry point host shells
    /// feed raw input through.
    pub async fn process(&self, input: &str) -> CommandReply {
        let Some(command) = self.parse(input) else {
            return CommandReply {
                accepted: false,
                message: format!(
                    "invalid command syntax: '{}' (expected @<agent> <action> [params])",
                    input.trim()
                ),
            };
        };
        let validation = self.validate(&command).await;
        if !validation.valid {
            return CommandReply {
                accepted: false,
                message: validation.message,
            };
        }
        match self.execute(&command).await {
            Ok(result) => CommandReply {
                accepted: true,
                message: result,
            },
            Err(e) => CommandReply {
                accepted: false,
                message: format!("command failed: {}", e),
            },
        }
    }

    /// Most-recent-first slice of command history.
    pub async fn recent_history(&self, limit: Option<usize>) -> Vec<String> {
        self.store
            .history(limit)
            .await
            .into_iter()
            .map(|e| e.text)
            .collect()
    }

    async fn execute_broadcast(&self, command: &Command) -> Result<String> {
        match command.action.as_str() {
            "status" => {
                let agents = self.store.agents().await;
                if agents.is_empty() {
                    return Ok("no agents registered".to_string());
                }
                let lines: Vec<String> = agents
                    .iter()
                    .map(|a| format!("@{} [{}] {}", a.id, a.kind.as_str(), a.status.as_str()))
                    .collect();
                Ok(lines.join("\n"))
            }
            "pause" | "resume" => {
                let count = self.store.agents().await.len();
                Ok(format!(
                    "broadcast '{}' delivered to {} agent(s)",
                    command.action, count
                ))
            }
            "help" => Ok(format!("@all supports: {}", BROADCAST_ACTIONS.join(", "))),
            other => Ok(format!("broadcast '{}' delivered", other)),
        }
    }

    async fn execute_system(&self, command: &Command) -> Result<String> {
        match command.action.as_str() {
            "settings" => {
                let settings = self.store.settings().await;
                Ok(serde_json::to_string_pretty(&settings)?)
            }
            "help" => Ok(format!(
                "commands take the form @<agent> <action> [params]\n@all supports: {}\n@system supports: {}",
                BROADCAST_ACTIONS.join(", "),
                SYSTEM_ACTIONS.join(", ")
            )),
            "clear" => {
                self.store.clear_history().await?;
                Ok("command history cleared".to_string())
            }
            "sync" => {
                self.store.synchronize().await?;
                Ok("synchronization triggered".to_string())
            }
            other => Ok(format!("system operation '{}' completed", other)),
        }
    }

    fn agent_result(command: &Command) -> String {
        match &command.params {
            Some(params) => format!(
                "@{} completed '{}' on \"{}\"",
                command.agent, command.action, params
            ),
            None => format!("@{} completed '{}'", command.agent, command.action),
        }
    }
}

#[cfg(test)]
mod tests;

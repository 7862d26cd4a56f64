use regex::Regex;

use super::{BROADCAST_ACTIONS, BROADCAST_ID, CommandProcessor, SYSTEM_ACTIONS, SYSTEM_ID,
            actions_for_kind};
use crate::core::store::HISTORY_LIMIT;

impl CommandProcessor {
    /// Completion candidates for a partially typed command. Four levels,
    /// keyed to how much of the grammar is present:
    /// a bare `@` lists every addressee; a complete `@agent` lists its
    /// allowed actions; a complete `@agent action` yields an example
    /// command; anything else falls back to prefix-matching history.
    /// Matching is prefix/exact only.
    pub async fn suggest(&self, partial: &str) -> Vec<String> {
        let text = partial.trim();

        if text == "@" {
            let mut ids: Vec<String> = self
                .store
                .agents()
                .await
                .into_iter()
                .map(|a| format!("@{}", a.id))
                .collect();
            ids.push(format!("@{}", BROADCAST_ID));
            ids.push(format!("@{}", SYSTEM_ID));
            return ids;
        }

        let addressee_re = Regex::new(r"^@([A-Za-z0-9_]+)$").unwrap();
        if let Some(caps) = addressee_re.captures(text)
            && let Some(actions) = self.actions_for_id(&caps[1]).await
        {
            return actions.iter().map(|a| a.to_string()).collect();
        }

        let pair_re = Regex::new(r"^@([A-Za-z0-9_]+)\s+([A-Za-z0-9_]+)$").unwrap();
        if let Some(caps) = pair_re.captures(text)
            && let Some(actions) = self.actions_for_id(&caps[1]).await
            && actions.contains(&&caps[2])
        {
            return vec![example_command(&caps[1], &caps[2])];
        }

        self.store
            .history(Some(HISTORY_LIMIT))
            .await
            .into_iter()
            .map(|e| e.text)
            .filter(|t| t.starts_with(text))
            .collect()
    }

    async fn actions_for_id(&self, id: &str) -> Option<&'static [&'static str]> {
        match id {
            BROADCAST_ID => Some(BROADCAST_ACTIONS),
            SYSTEM_ID => Some(SYSTEM_ACTIONS),
            _ => self
                .store
                .agent(id)
                .await
                .map(|agent| actions_for_kind(agent.kind)),
        }
    }
}

fn example_command(agent: &str, action: &str) -> String {
    let hint = example_params(action);
    if hint.is_empty() {
        format!("@{} {}", agent, action)
    } else {
        format!("@{} {} {}", agent, action, hint)
    }
}

fn example_params(action: &str) -> &'static str {
    match action {
        "search" => "solar panel efficiency",
        "analyze" => "quarterly sales data",
        "summarize" => "meeting notes",
        "schedule" => "team sync tomorrow 10:00",
        "remind" => "submit report at 17:00",
        "report" => "weekly metrics",
        "chart" => "revenue by region",
        "write" => "launch announcement draft",
        "design" => "landing page hero",
        "brainstorm" => "onboarding improvements",
        "review" => "auth module changes",
        "debug" => "flaky login test",
        "refactor" => "storage layer",
        _ => "",
    }
}

//! Prompt assembly for the decision source.
//!
//! Templates live next to this module and are embedded at compile time.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::extract::{BannerInfo, GameState};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const TURN_TEMPLATE: &str = include_str!("prompts/turn.md");

/// Shown in place of a field the extractor could not find.
const UNKNOWN: &str = "unknown";

/// Conversation handed to the decision source for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionContext {
    pub system: String,
    pub user: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system prompt template")?;
        env.add_template("turn", TURN_TEMPLATE)
            .context("load turn prompt template")?;
        Ok(Self { env })
    }

    /// Render the system instruction and the per-turn user content.
    pub fn build(
        &self,
        banner: &BannerInfo,
        state: &GameState,
        recent: &str,
    ) -> Result<DecisionContext> {
        let system = self
            .env
            .get_template("system")?
            .render(())
            .context("render system prompt")?;
        let user = self
            .env
            .get_template("turn")?
            .render(context! {
                location => banner.location.as_deref().unwrap_or(UNKNOWN),
                score => banner.score.map_or_else(|| UNKNOWN.to_string(), |s| s.to_string()),
                turns => banner.turns.map_or_else(|| UNKNOWN.to_string(), |t| t.to_string()),
                room => state.room.as_deref(),
                inventory => &state.inventory,
                recent => recent,
            })
            .context("render turn prompt")?;
        debug!(user_bytes = user.len(), "prompt rendered");
        Ok(DecisionContext {
            system: system.trim().to_string(),
            user,
        })
    }
}

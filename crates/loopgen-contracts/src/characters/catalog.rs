use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One clip request: which action to animate, with what prompt, for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub id: String,
    pub prompt: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub actions: IndexMap<String, ActionSpec>,
}

impl Character {
    pub fn action(&self, id: &str) -> Option<&ActionSpec> {
        self.actions.get(id)
    }

    pub fn action_ids(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// All actions in catalog order, or just `requested` when given.
    pub fn select_actions(&self, requested: Option<&str>) -> Result<Vec<ActionSpec>> {
        match requested {
            Some(id) => match self.action(id) {
                Some(spec) => Ok(vec![spec.clone()]),
                None => bail!(
                    "unknown action '{id}' for character '{}'. Available actions: {}",
                    self.id,
                    self.action_ids().join(", ")
                ),
            },
            None => Ok(self.actions.values().cloned().collect()),
        }
    }

    pub fn label(&self) -> String {
        if self.emoji.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.emoji, self.name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct CharacterCatalog {
    characters: IndexMap<String, Character>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CharacterFile {
    name: String,
    #[serde(default)]
    emoji: String,
    #[serde(default)]
    description: String,
    actions: IndexMap<String, ActionFile>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ActionFile {
    prompt: String,
    duration: u32,
}

impl CharacterCatalog {
    pub fn new(characters: Option<IndexMap<String, Character>>) -> Self {
        Self {
            characters: characters.unwrap_or_else(super::builtin::default_characters),
        }
    }

    pub fn builtin() -> Self {
        Self::new(None)
    }

    /// Parses a catalog of the form
    /// `{"<id>": {"name", "emoji", "description", "actions": {"<action>": {"prompt", "duration"}}}}`.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: IndexMap<String, CharacterFile> =
            serde_json::from_str(raw).context("character catalog is not valid JSON")?;
        let mut characters = IndexMap::new();
        for (id, file) in parsed {
            if file.actions.is_empty() {
                bail!("character '{id}' has no actions");
            }
            let mut actions = IndexMap::new();
            for (action_id, action) in file.actions {
                if action.prompt.trim().is_empty() {
                    bail!("action '{action_id}' of character '{id}' has an empty prompt");
                }
                if action.duration == 0 {
                    bail!("action '{action_id}' of character '{id}' has a zero duration");
                }
                actions.insert(
                    action_id.clone(),
                    ActionSpec {
                        id: action_id,
                        prompt: action.prompt,
                        duration_seconds: action.duration,
                    },
                );
            }
            characters.insert(
                id.clone(),
                Character {
                    id,
                    name: file.name,
                    emoji: file.emoji,
                    description: file.description,
                    actions,
                },
            );
        }
        if characters.is_empty() {
            bail!("character catalog is empty");
        }
        Ok(Self::new(Some(characters)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading catalog {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid catalog {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.characters.keys().map(String::as_str).collect()
    }

    pub fn list(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn resolve(&self, id: &str) -> Result<&Character> {
        match self.get(id) {
            Some(character) => Ok(character),
            None => bail!(
                "unknown character '{id}'. Available characters: {}",
                self.ids().join(", ")
            ),
        }
    }
}

//! Static profile facts the chat assistant is allowed to talk about

pub mod knowledge;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub use knowledge::{render_knowledge_base, system_prompt};

/// Profile shipped with the binary
const BUILTIN_PROFILE: &str = include_str!("../../data/profile.json");

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub personal: Personal,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub skills: Vec<SkillGroup>,
    #[serde(default)]
    pub education: Vec<Education>,
    pub now: Now,
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Initial view counts keyed by content slug
    #[serde(default)]
    pub view_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personal {
    pub name: String,
    pub title: String,
    pub positioning: String,
    pub tagline: String,
    pub email: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub experience_years: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub employment_type: String,
    pub period: String,
    pub location: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub slug: String,
    pub name: String,
    pub category: String,
    pub period: String,
    pub status: String,
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGroup {
    pub category: String,
    pub items: Vec<Skill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub period: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Now {
    pub last_updated: String,
    pub currently_building: String,
    #[serde(default)]
    pub currently_learning: Vec<String>,
    #[serde(default)]
    pub available_for: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub path: String,
    pub description: String,
}

impl Profile {
    /// The profile compiled into the binary
    pub fn builtin() -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(BUILTIN_PROFILE)?)
    }

    /// Load a profile document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load from `path` when given, otherwise fall back to the built-in profile
    pub fn load(path: Option<&Path>) -> Result<Self, ProfileError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }
}

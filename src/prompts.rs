use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Model parameters for one generation task, as declared in
/// `prompts/config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Path of the system prompt Markdown file, relative to the prompts dir.
    pub prompt_file: String,
}

#[derive(Debug, Deserialize)]
struct PromptConfigFile {
    game_intro: ModelConfig,
    review_translation: ModelConfig,
    kansai_highlights: ModelConfig,
    kansai_catch: ModelConfig,
}

/// A resolved task: system prompt text plus its model parameters.
#[derive(Debug, Clone)]
pub struct TaskPrompt {
    pub prompt: String,
    pub config: ModelConfig,
}

/// All four generation tasks, loaded up front so a broken prompt setup fails
/// the run before any network work happens.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub intro: TaskPrompt,
    pub translation: TaskPrompt,
    pub highlights: TaskPrompt,
    pub catch: TaskPrompt,
}

pub fn load_prompts(prompts_dir: &Path) -> Result<PromptSet> {
    let config_path = prompts_dir.join("config.yaml");
    let raw = fs::read_to_string(&config_path)
        .map_err(|err| Error::Config(format!("read {}: {err}", config_path.display())))?;
    let parsed: PromptConfigFile = serde_yaml::from_str(&raw)
        .map_err(|err| Error::Config(format!("parse {}: {err}", config_path.display())))?;

    Ok(PromptSet {
        intro: resolve(prompts_dir, parsed.game_intro)?,
        translation: resolve(prompts_dir, parsed.review_translation)?,
        highlights: resolve(prompts_dir, parsed.kansai_highlights)?,
        catch: resolve(prompts_dir, parsed.kansai_catch)?,
    })
}

fn resolve(prompts_dir: &Path, config: ModelConfig) -> Result<TaskPrompt> {
    let path = prompts_dir.join(&config.prompt_file);
    let prompt = fs::read_to_string(&path)
        .map_err(|err| Error::Config(format!("read prompt {}: {err}", path.display())))?;
    Ok(TaskPrompt { prompt, config })
}

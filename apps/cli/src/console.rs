//! Dialoguer-backed implementation of the core `Prompt` trait.
//!
//! Esc/cancel at any prompt maps to the empty answer the pipeline treats
//! as "finish this branch early".

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Password};
use lanmount_core::error::{Error, Result};
use lanmount_core::prompt::Prompt;

pub struct ConsolePrompt {
    theme: ColorfulTheme,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Prompt {
        message: e.to_string(),
    }
}

impl Prompt for ConsolePrompt {
    fn choose(&self, title: &str, options: &[String]) -> Result<Vec<usize>> {
        let picked = MultiSelect::with_theme(&self.theme)
            .with_prompt(title)
            .items(options)
            .interact_opt()
            .map_err(prompt_error)?;

        Ok(picked.unwrap_or_default())
    }

    fn input(&self, title: &str, default: &str) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(title)
            .allow_empty(true);
        if !default.is_empty() {
            input = input.default(default.to_string());
        }

        input.interact_text().map_err(prompt_error)
    }

    fn secret(&self, title: &str) -> Result<String> {
        Password::with_theme(&self.theme)
            .with_prompt(title)
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(true)
            .interact_opt()
            .map_err(prompt_error)?;

        Ok(answer.unwrap_or(false))
    }
}

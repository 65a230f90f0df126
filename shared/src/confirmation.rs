use crate::types::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

/// Ask before an irreversible console action, such as deleting a saved
/// transcript. Returns `default_yes` when the user just presses enter.
pub fn ask_confirmation(prompt: &str, default_yes: bool) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default_yes)
        .wait_for_newline(true)
        .interact()?)
}

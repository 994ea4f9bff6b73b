//! Password handling for CLI operations.

use arcflow::PasswordProvider;
use rpassword::prompt_password;

/// Asks on the terminal when an archive turns out to be encrypted.
pub struct PromptPassword;

impl PasswordProvider for PromptPassword {
    fn request_password(&mut self, display_name: &str) -> Option<String> {
        match prompt_password(format!("Password for {display_name}: ")) {
            Ok(pwd) if !pwd.is_empty() => Some(pwd),
            _ => None,
        }
    }
}

/// Prompts for password confirmation (for creating encrypted archives)
pub fn confirm_password() -> Option<String> {
    let pwd1 = prompt_password("Enter password: ").ok()?;

    if pwd1.is_empty() {
        eprintln!("Password cannot be empty");
        return None;
    }

    let pwd2 = prompt_password("Confirm password: ").ok()?;

    if pwd1 == pwd2 {
        Some(pwd1)
    } else {
        eprintln!("Passwords do not match");
        None
    }
}

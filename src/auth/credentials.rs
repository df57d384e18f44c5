//! Storage token management
//!
//! The upload token lives in the `ASTROVISION_STORAGE_TOKEN` environment
//! variable, normally loaded from a `.env` file in the working directory.
//! The file is written with owner-only permissions and other lines in it are
//! preserved.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::constants::{auth, env as env_constants, files};
use crate::errors::{AuthError, AuthResult};

/// Authentication status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    /// Whether the token environment variable is set and non-empty
    pub token_set: bool,
    /// Whether the .env file exists
    pub dotenv_file_exists: bool,
    /// Whether the .env file contains a token line
    pub token_in_dotenv: bool,
}

impl AuthStatus {
    pub fn has_token(&self) -> bool {
        self.token_set || self.token_in_dotenv
    }

    /// Get descriptive status message for display
    pub fn status_message(&self) -> String {
        match (self.token_set, self.token_in_dotenv) {
            (false, false) => "Missing storage token - run 'auth setup' to configure".to_string(),
            (true, false) => "Storage token set in the environment".to_string(),
            (false, true) => "Storage token stored in .env but not loaded".to_string(),
            (true, true) => "Storage token configured".to_string(),
        }
    }
}

/// Check current authentication status against `.env` in the working directory
pub fn get_auth_status() -> AuthStatus {
    status_for(Path::new(files::ENV_FILE))
}

fn status_for(env_path: &Path) -> AuthStatus {
    AuthStatus {
        token_set: check_token(),
        dotenv_file_exists: env_path.exists(),
        token_in_dotenv: read_token(env_path).ok().flatten().is_some(),
    }
}

/// Check if the token exists in the environment
pub fn check_token() -> bool {
    env::var(env_constants::STORAGE_TOKEN)
        .map(|token| !token.trim().is_empty())
        .unwrap_or(false)
}

/// Reject tokens that are obviously not access tokens
pub fn validate_token(token: &str) -> AuthResult<()> {
    if token.is_empty() {
        return Err(AuthError::InvalidToken {
            reason: "Token cannot be empty".to_string(),
        });
    }
    if token.len() < auth::MIN_TOKEN_LENGTH {
        return Err(AuthError::InvalidToken {
            reason: format!(
                "Token is too short ({} characters, expected at least {})",
                token.len(),
                auth::MIN_TOKEN_LENGTH
            ),
        });
    }
    if token.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidToken {
            reason: "Token cannot contain whitespace".to_string(),
        });
    }
    Ok(())
}

/// Prompt for the token without echoing it
pub fn prompt_token() -> AuthResult<String> {
    let token = rpassword::prompt_password("Storage access token: ")?;
    let token = token.trim().to_string();
    validate_token(&token)?;
    Ok(token)
}

fn token_prefix() -> String {
    format!("{}=", env_constants::STORAGE_TOKEN)
}

/// Token stored in an env file, if any
pub fn read_token(env_path: &Path) -> AuthResult<Option<String>> {
    if !env_path.exists() {
        return Ok(None);
    }

    let prefix = token_prefix();
    let reader = BufReader::new(File::open(env_path)?);
    for line in reader.lines() {
        let line = line?;
        if let Some(value) = line.trim().strip_prefix(&prefix) {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Ok(Some(value.to_string()));
            }
        }
    }
    Ok(None)
}

/// Write every line except existing token lines, then `extra` if given
fn rewrite_env_file(env_path: &Path, extra: Option<String>) -> AuthResult<bool> {
    let prefix = token_prefix();
    let mut lines = Vec::new();
    let mut replaced = false;

    if env_path.exists() {
        let reader = BufReader::new(File::open(env_path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().starts_with(&prefix) {
                replaced = true;
            } else {
                lines.push(line);
            }
        }
    }
    lines.extend(extra);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(env_path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(auth::ENV_FILE_PERMISSIONS);
        file.set_permissions(perms)?;
    }

    Ok(replaced)
}

/// Store the token in an env file with owner-only permissions
pub fn save_token(env_path: &Path, token: &str) -> AuthResult<()> {
    validate_token(token)?;
    rewrite_env_file(env_path, Some(format!("{}{}", token_prefix(), token)))?;
    Ok(())
}

/// Remove the token from an env file, returning whether one was present
pub fn clear_token(env_path: &Path) -> AuthResult<bool> {
    if !env_path.exists() {
        return Ok(false);
    }
    rewrite_env_file(env_path, None)
}

fn confirm(question: &str) -> AuthResult<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase().starts_with('y'))
}

/// Interactive token setup workflow
pub fn setup_token(force: bool) -> AuthResult<()> {
    let env_path = Path::new(files::ENV_FILE);

    println!("AstroVision Storage Setup");
    println!("=========================");
    println!();
    println!("Publishing uploads archives with a storage access token.");
    println!("The token is stored in {} in the current directory.", files::ENV_FILE);
    println!();

    if get_auth_status().has_token() && !force {
        println!("Warning: A storage token is already configured.");
        if !confirm("Do you want to replace it?")? {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    let token = prompt_token()?;
    save_token(env_path, &token)?;
    env::set_var(env_constants::STORAGE_TOKEN, &token);

    println!("Token saved to {}", env_path.display());
    #[cfg(unix)]
    println!("File permissions set to owner-only (600)");
    #[cfg(not(unix))]
    println!(
        "Warning: File permissions not set (non-Unix system). Please ensure {} is protected.",
        files::ENV_FILE
    );

    Ok(())
}

/// Print current authentication status
pub fn show_auth_status() {
    let status = get_auth_status();

    println!("AstroVision Storage Status");
    println!("==========================");
    println!();
    println!(
        "{}: {}",
        env_constants::STORAGE_TOKEN,
        if status.token_set { "Set" } else { "Not set" }
    );
    println!(
        "{} file: {}",
        files::ENV_FILE,
        if status.dotenv_file_exists {
            "Exists"
        } else {
            "Not found"
        }
    );
    println!();
    println!("Status: {}", status.status_message());

    if !status.has_token() {
        println!();
        println!("To configure the token, run: astrovision_sync auth setup");
    }
}

/// Remove the stored token from `.env` and the current environment
pub fn clear_stored_token() -> AuthResult<bool> {
    let removed = clear_token(Path::new(files::ENV_FILE))?;
    env::remove_var(env_constants::STORAGE_TOKEN);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOKEN: &str = "sl.test-token-0123456789abcdef";

    #[test]
    fn test_validate_token() {
        assert!(validate_token(TOKEN).is_ok());
        assert!(validate_token("").is_err());
        assert!(validate_token("short").is_err());
        assert!(validate_token("has whitespace inside it").is_err());
    }

    #[test]
    fn test_save_token_preserves_other_lines() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let env_path = temp_dir.path().join(".env");
        std::fs::write(
            &env_path,
            "RUST_LOG=debug\nASTROVISION_STORAGE_TOKEN=old-token-0000000000\n",
        )?;

        save_token(&env_path, TOKEN)?;

        let contents = std::fs::read_to_string(&env_path)?;
        assert!(contents.contains("RUST_LOG=debug"));
        assert!(!contents.contains("old-token"));
        assert_eq!(read_token(&env_path)?.as_deref(), Some(TOKEN));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&env_path)?.permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        Ok(())
    }

    #[test]
    fn test_save_rejects_invalid_token() {
        let temp_dir = TempDir::new().unwrap();
        let env_path = temp_dir.path().join(".env");

        let err = save_token(&env_path, "abc").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
        assert!(!env_path.exists());
    }

    #[test]
    fn test_clear_token() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let env_path = temp_dir.path().join(".env");

        assert!(!clear_token(&env_path)?);

        save_token(&env_path, TOKEN)?;
        assert!(clear_token(&env_path)?);
        assert_eq!(read_token(&env_path)?, None);
        assert!(!clear_token(&env_path)?);
        Ok(())
    }

    #[test]
    fn test_status_for_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let env_path = temp_dir.path().join(".env");

        let status = status_for(&env_path);
        assert!(!status.dotenv_file_exists);
        assert!(!status.token_in_dotenv);

        save_token(&env_path, TOKEN).unwrap();
        let status = status_for(&env_path);
        assert!(status.dotenv_file_exists);
        assert!(status.token_in_dotenv);
        assert!(status.has_token());
    }

    #[test]
    fn test_status_messages() {
        let mut status = AuthStatus {
            token_set: false,
            dotenv_file_exists: false,
            token_in_dotenv: false,
        };
        assert!(status.status_message().contains("Missing"));

        status.token_in_dotenv = true;
        assert!(status.status_message().contains("not loaded"));

        status.token_set = true;
        assert_eq!(status.status_message(), "Storage token configured");
    }
}

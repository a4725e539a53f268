//! First-run profile capture.
//!
//! Returning users are loaded from the store. New users point the agent at
//! their `profile-data.json`, answer a handful of demographic questions, and
//! the resulting profile is saved once.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::channels::Terminal;
use crate::error::{ChannelError, ProfileError, Result};
use crate::profile::{Culture, UserProfile};
use crate::store::Database;

/// File looked up inside a directory given as the profile data path.
pub const PROFILE_DATA_FILE: &str = "profile-data.json";

/// Use the configured username, else ask for one.
pub async fn resolve_username(
    terminal: &mut dyn Terminal,
    configured: Option<&str>,
) -> Result<String> {
    if let Some(name) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    let name = ask(terminal, "Please enter your username: ").await?;
    if name.is_empty() {
        return Err(ProfileError::EmptyUsername.into());
    }
    Ok(name)
}

/// Load the stored profile, or capture and save a new one.
pub async fn load_or_create(
    store: &dyn Database,
    terminal: &mut dyn Terminal,
    username: &str,
) -> Result<UserProfile> {
    if let Some(profile) = store.get_user(username).await? {
        info!(user = %username, "Loaded existing profile");
        return Ok(profile);
    }

    terminal.notice(&format!("Welcome, {username}. Let's set up your profile."));
    let location = ask(terminal, "Please enter the path to your profile data: ").await?;
    let dimensions = import_dimensions(Path::new(&location), username).await?;

    let mut profile = UserProfile::new(username, dimensions);
    profile.birthdate = ask(terminal, "Please enter your birthdate: ").await?;
    profile.gender = ask(terminal, "Please enter your gender: ").await?;
    profile.sexual_orientation = ask(terminal, "Please enter your sexual orientation: ").await?;
    profile.culture = Culture {
        born_in_country: ask(terminal, "Please enter the country you were born in: ").await?,
        most_in_country: ask(terminal, "Please enter the country you've spent the most time in: ")
            .await?,
        born_in_city: ask(terminal, "Please enter the city you were born in: ").await?,
        most_in_city: ask(terminal, "Please enter the city you've spent the most time in: ").await?,
        religion: ask(terminal, "Please enter your religion: ").await?,
        interests: ask(terminal, "Please enter your interests: ").await?,
    };
    profile.language = ask(terminal, "Please enter your native language: ").await?;

    store.save_user(&profile).await?;
    info!(
        user = %username,
        dimensions = profile.dimension_scores().len(),
        "Created profile"
    );
    Ok(profile)
}

/// Read raw assessment data from a `profile-data.json` file or a directory
/// containing one.
pub async fn import_dimensions(
    location: &Path,
    username: &str,
) -> std::result::Result<serde_json::Value, ProfileError> {
    let path: PathBuf = if location.is_dir() {
        location.join(PROFILE_DATA_FILE)
    } else {
        location.to_path_buf()
    };
    let import_error = |reason: String| ProfileError::Import {
        path: path.display().to_string(),
        reason,
    };

    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| import_error(e.to_string()))?;
    let dimensions: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| import_error(e.to_string()))?;

    if UserProfile::new(username, dimensions.clone())
        .dimension_scores()
        .is_empty()
    {
        return Err(ProfileError::NoDimensions {
            username: username.to_string(),
        });
    }
    Ok(dimensions)
}

/// One trimmed answer. End of input during setup is an error.
async fn ask(terminal: &mut dyn Terminal, prompt: &str) -> Result<String> {
    match terminal.read_line(prompt).await? {
        Some(line) => Ok(line.trim().to_string()),
        None => Err(ChannelError::Read("input closed during profile setup".to_string()).into()),
    }
}

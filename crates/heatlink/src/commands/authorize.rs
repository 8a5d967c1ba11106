//! `heatlink authorize <entry>`: the OAuth authorization-code flow.

use dialoguer::Input;
use owo_colors::OwoColorize;
use url::Url;

use heatlink_api::UplinkSession;
use heatlink_config::{Config, read_state, write_state};

use crate::cli::AuthorizeArgs;
use crate::commands::{prompt_err, resolve_entry};
use crate::error::CliError;

pub async fn handle(args: AuthorizeArgs, config: &Config) -> Result<(), CliError> {
    let (entry_id, mut access_point) = resolve_entry(config, &args.entry)?;
    // Always start from a fresh grant.
    access_point.access_data = None;

    let session = UplinkSession::open(access_point.session_config(None))?;
    let url = session.authorize_url(&format!("heatlink-{entry_id}"))?;

    println!("Open this URL and grant access:\n\n  {}\n", url.as_str().underline());
    println!(
        "You will be redirected to {}; paste the full redirect URL or just the code.",
        access_point.redirect_uri
    );

    let raw = match args.code {
        Some(code) => code,
        None => Input::<String>::new()
            .with_prompt("Authorization code")
            .interact_text()
            .map_err(prompt_err)?,
    };
    let code = extract_code(&raw).ok_or_else(|| CliError::Validation {
        field: "code".into(),
        reason: "no authorization code found in input".into(),
    })?;

    let access_data = session.exchange_code(&code).await?;
    session.close();

    let path = config.state_file(entry_id.as_str())?;
    let mut state = read_state(&path)?;
    state.set_access_data(&access_data);
    write_state(&path, &state)?;

    println!(
        "{} {entry_id} authorized ({})",
        "✓".green().bold(),
        access_data.scope.as_deref().unwrap_or("no scope reported")
    );
    Ok(())
}

/// Accept either a bare code or the redirect URL carrying `?code=`.
fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) => Some(input.to_owned()),
    }
}

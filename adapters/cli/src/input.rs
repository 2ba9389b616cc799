//! Translation of typed lines into session commands and views.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tower_catch_core::{Command, ProfilePreservation, Tier};

/// What a typed line asks the adapter to do.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input {
    /// Forward a command to the session.
    Command(Command),
    /// Print a read-only view.
    Show(View),
    /// Leave the game without signing out.
    Quit,
    /// Nothing was typed.
    Empty,
}

/// Read-only screens the adapter can print.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum View {
    Help,
    Status,
    Shop,
    Profile(Option<String>),
    Badges,
    Collection,
    Stats,
    Search(String),
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct Line {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Create an account and sign into it.
    Register {
        username: String,
        password: String,
        confirmation: String,
    },
    /// Sign into an existing account.
    Login {
        username: String,
        #[arg(default_value = "")]
        password: String,
    },
    /// Sign out.
    Logout,
    /// Skip the rest of the countdown.
    Go,
    /// Skip the revealed tower.
    Skip,
    /// Show the shop, or buy a spawn of the given tier.
    Shop { tier: Option<Tier> },
    /// Change your username.
    Rename { username: String },
    /// Change your password.
    Password {
        password: String,
        confirmation: String,
    },
    /// Set your favourite tower; no argument clears it.
    Favorite { entity: Vec<String> },
    /// Set your least favourite tower; no argument clears it.
    Least { entity: Vec<String> },
    /// Set your profile quote.
    Quote { words: Vec<String> },
    /// Wipe your progress.
    Reset {
        /// Switch to a fresh generated username.
        #[arg(long)]
        new_name: bool,
        /// Clear favourite and least favourite towers.
        #[arg(long)]
        clear_favorites: bool,
        /// Clear the profile quote.
        #[arg(long)]
        clear_quote: bool,
    },
    /// Delete an account.
    Remove { username: String },
    /// Show a profile card.
    Profile { username: Option<String> },
    /// List badges.
    Badges,
    /// Show the collection.
    Collection,
    /// Show global statistics.
    Stats,
    /// Search accounts.
    Search { query: Option<String> },
    /// Show the round state.
    Status,
    /// List commands.
    Help,
    /// Leave the game.
    Quit,
}

/// Parses one typed line.
///
/// Lines starting with `/` are commands; anything else is a guess.
pub(crate) fn parse(line: &str) -> Result<Input> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        if trimmed.is_empty() {
            return Ok(Input::Empty);
        }
        return Ok(Input::Command(Command::SubmitGuess {
            guess: trimmed.to_owned(),
        }));
    };

    let words = shlex::split(command).ok_or_else(|| anyhow!("unbalanced quotes in `{trimmed}`"))?;
    let line = Line::try_parse_from(words)?;
    Ok(match line.action {
        Action::Register {
            username,
            password,
            confirmation,
        } => Input::Command(Command::Register {
            username,
            password,
            confirmation,
        }),
        Action::Login { username, password } => {
            Input::Command(Command::Login { username, password })
        }
        Action::Logout => Input::Command(Command::Logout),
        Action::Go => Input::Command(Command::AdvanceCountdown),
        Action::Skip => Input::Command(Command::SkipRound),
        Action::Shop { tier: Some(tier) } => Input::Command(Command::SpawnFromShop { tier }),
        Action::Shop { tier: None } => Input::Show(View::Shop),
        Action::Rename { username } => Input::Command(Command::ChangeUsername { username }),
        Action::Password {
            password,
            confirmation,
        } => Input::Command(Command::ChangePassword {
            password,
            confirmation,
        }),
        Action::Favorite { entity } => Input::Command(Command::SetFavorite {
            entity: entity.join(" "),
        }),
        Action::Least { entity } => Input::Command(Command::SetLeastFavorite {
            entity: entity.join(" "),
        }),
        Action::Quote { words } => Input::Command(Command::SetQuote {
            quote: words.join(" "),
        }),
        Action::Reset {
            new_name,
            clear_favorites,
            clear_quote,
        } => Input::Command(Command::ResetProgress {
            preserve: ProfilePreservation {
                keep_username: !new_name,
                keep_favorites: !clear_favorites,
                keep_quote: !clear_quote,
            },
        }),
        Action::Remove { username } => Input::Command(Command::RemoveAccount { username }),
        Action::Profile { username } => Input::Show(View::Profile(username)),
        Action::Badges => Input::Show(View::Badges),
        Action::Collection => Input::Show(View::Collection),
        Action::Stats => Input::Show(View::Stats),
        Action::Search { query } => Input::Show(View::Search(query.unwrap_or_default())),
        Action::Status => Input::Show(View::Status),
        Action::Help => Input::Show(View::Help),
        Action::Quit => Input::Quit,
    })
}

/// Usage text listing every command.
pub(crate) fn help() -> String {
    use clap::CommandFactory;

    Line::command()
        .override_usage("/<command> [args]")
        .render_help()
        .to_string()
}

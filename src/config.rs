// Configuration loading and parsing (auction.toml).
//
// The config carries infrastructure settings (database path, lock timeout)
// and the seed data for the auction documents: teams, players, and users.
// Seeds only apply to documents that have never been written, so editing the
// file does not disturb a running auction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::auction::model::{Money, Player, PlayerId, Role, Team, User};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSection,
    pub engine: EngineSection,
    pub teams: Vec<TeamSeed>,
    pub players: Vec<PlayerSeed>,
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSection {
    /// Database file path. When omitted, the platform data directory is used.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Upper bound on waiting for the serialization guard before an
    /// operation reports busy.
    pub lock_timeout_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            lock_timeout_ms: 2000,
        }
    }
}

impl EngineSection {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Seed definition for a team: the starting purse doubles as the default
/// purse that reset restores.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamSeed {
    pub team_name: String,
    pub purse: Money,
}

impl TeamSeed {
    fn to_team(&self) -> Team {
        Team {
            team_name: self.team_name.clone(),
            purse: self.purse,
            default_purse: self.purse,
        }
    }
}

/// Seed definition for a player; always starts unsold.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSeed {
    pub id: PlayerId,
    pub name: String,
    pub age: u32,
    pub role: String,
    #[serde(default)]
    pub base_price: Money,
    #[serde(default)]
    pub grade: String,
}

impl PlayerSeed {
    fn to_player(&self) -> Player {
        Player {
            id: self.id,
            name: self.name.clone(),
            age: self.age,
            role: self.role.clone(),
            base_price: self.base_price,
            grade: self.grade.clone(),
            sold: false,
            sold_to: String::new(),
            final_price: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseSection::default(),
            engine: EngineSection::default(),
            teams: vec![
                TeamSeed {
                    team_name: "Chaitu Cheetahs".into(),
                    purse: 10_000,
                },
                TeamSeed {
                    team_name: "Sai Warriors".into(),
                    purse: 10_000,
                },
            ],
            players: vec![PlayerSeed {
                id: 1,
                name: "Srinu Dantuluri".into(),
                age: 45,
                role: "Bowler".into(),
                base_price: 1000,
                grade: "V".into(),
            }],
            users: vec![
                User {
                    username: "auctioneer1".into(),
                    password: "admin".into(),
                    role: Role::Auctioneer,
                    team_name: String::new(),
                },
                User {
                    username: "bidder1".into(),
                    password: "pass1".into(),
                    role: Role::Bidder,
                    team_name: "Chaitu Cheetahs".into(),
                },
                User {
                    username: "bidder2".into(),
                    password: "pass2".into(),
                    role: Role::Bidder,
                    team_name: "Sai Warriors".into(),
                },
            ],
        }
    }
}

impl Config {
    pub fn seed_teams(&self) -> Vec<Team> {
        self.teams.iter().map(TeamSeed::to_team).collect()
    }

    pub fn seed_players(&self) -> Vec<Player> {
        self.players.iter().map(PlayerSeed::to_player).collect()
    }

    /// Resolve the database file path: the configured path, or `auction.db`
    /// under the platform data directory.
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(PathBuf::from(path));
        }
        let dirs = directories::ProjectDirs::from("", "", "auction-desk")
            .ok_or_else(|| anyhow::anyhow!("could not determine platform data directory"))?;
        std::fs::create_dir_all(dirs.data_dir())?;
        Ok(dirs.data_dir().join("auction.db"))
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `path`. Fails if the file is absent.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load `auction.toml` from the working directory, falling back to the
/// built-in defaults when the file does not exist.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = Path::new("auction.toml");
    if !path.exists() {
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }
    load_config_from(path)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    for (i, team) in config.teams.iter().enumerate() {
        if team.purse == 0 {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].purse"),
                message: "must be greater than 0".into(),
            });
        }
        if config.teams[..i].iter().any(|t| t.team_name == team.team_name) {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].team_name"),
                message: format!("duplicate team name `{}`", team.team_name),
            });
        }
    }

    for (i, player) in config.players.iter().enumerate() {
        if config.players[..i].iter().any(|p| p.id == player.id) {
            return Err(ConfigError::ValidationError {
                field: format!("players[{i}].id"),
                message: format!("duplicate player id {}", player.id),
            });
        }
    }

    for (i, user) in config.users.iter().enumerate() {
        if config.users[..i].iter().any(|u| u.username == user.username) {
            return Err(ConfigError::ValidationError {
                field: format!("users[{i}].username"),
                message: format!("duplicate username `{}`", user.username),
            });
        }
        if user.role == Role::Bidder
            && !config.teams.iter().any(|t| t.team_name == user.team_name)
        {
            return Err(ConfigError::ValidationError {
                field: format!("users[{i}].team_name"),
                message: format!("bidder references unknown team `{}`", user.team_name),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

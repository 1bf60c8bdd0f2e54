use std::env;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "users.db";
const DEFAULT_LOG_PATH: &str = "pong-gate.log";
const DB_ENV: &str = "PONG_GATE_DB";
const LOG_ENV: &str = "PONG_GATE_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command
{
    Play,
    Captcha,
    List,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig
{
    pub command: Command,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub picture: Option<PathBuf>,
}

impl AppConfig
{
    pub fn from_env_args() -> Result<Self, String>
    {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_args(&args, |key| env::var(key).ok())
    }

    /// Parse the command line. `lookup` supplies environment defaults.
    pub fn from_args(
        args: &[String],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String>
    {
        let mut config = Self {
            command: Command::Play,
            db_path: lookup(DB_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            log_path: lookup(LOG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
            picture: None,
        };

        let mut command_seen = false;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if let Some((key, value)) = split_option(arg) {
                let value = match value {
                    Some(value) => value.to_string(),
                    None => iter
                        .next()
                        .cloned()
                        .ok_or_else(|| format!("Expected value after --{key}"))?,
                };
                if value.is_empty() {
                    return Err(format!("--{key} needs a non-empty value"));
                }
                match key {
                    "db" => config.db_path = PathBuf::from(value),
                    "log" => config.log_path = PathBuf::from(value),
                    "picture" => config.picture = Some(PathBuf::from(value)),
                    _ => return Err(format!("Unknown option '--{key}'. Run with --help.")),
                }
                continue;
            }

            let command = match arg.as_str() {
                "-h" | "--help" | "help" => Command::Help,
                "play" | "pong" => Command::Play,
                "captcha" => Command::Captcha,
                "list" => Command::List,
                other => return Err(format!("Unknown command '{other}'. Run with --help.")),
            };
            if command_seen {
                return Err(format!("Unexpected extra command '{arg}'"));
            }
            command_seen = true;
            config.command = command;
        }

        Ok(config)
    }
}

fn split_option(arg: &str) -> Option<(&str, Option<&str>)>
{
    if arg == "--help" {
        return None;
    }
    let rest = arg.strip_prefix("--")?;
    match rest.split_once('=') {
        Some((key, value)) => Some((key, Some(value))),
        None => Some((rest, None)),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn args(list: &[&str]) -> Vec<String>
    {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String>
    {
        None
    }

    #[test]
    fn defaults_to_play_with_builtin_paths()
    {
        let config = AppConfig::from_args(&[], no_env).unwrap();
        assert_eq!(config.command, Command::Play);
        assert_eq!(config.db_path, PathBuf::from("users.db"));
        assert_eq!(config.log_path, PathBuf::from("pong-gate.log"));
        assert_eq!(config.picture, None);
    }

    #[test]
    fn environment_sets_defaults_and_flags_win()
    {
        let env = |key: &str| match key {
            "PONG_GATE_DB" => Some("/tmp/env.db".to_string()),
            "PONG_GATE_LOG" => Some("/tmp/env.log".to_string()),
            _ => None,
        };
        let config = AppConfig::from_args(&[], env).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/env.db"));
        assert_eq!(config.log_path, PathBuf::from("/tmp/env.log"));

        let config = AppConfig::from_args(&args(&["--db=/tmp/flag.db"]), env).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/flag.db"));
        assert_eq!(config.log_path, PathBuf::from("/tmp/env.log"));
    }

    #[test]
    fn parses_commands_and_both_option_forms()
    {
        let config = AppConfig::from_args(
            &args(&["captcha", "--picture", "art.txt", "--log=run.log"]),
            no_env,
        )
        .unwrap();
        assert_eq!(config.command, Command::Captcha);
        assert_eq!(config.picture, Some(PathBuf::from("art.txt")));
        assert_eq!(config.log_path, PathBuf::from("run.log"));

        assert_eq!(
            AppConfig::from_args(&args(&["pong"]), no_env).unwrap().command,
            Command::Play
        );
        assert_eq!(
            AppConfig::from_args(&args(&["list"]), no_env).unwrap().command,
            Command::List
        );
        assert_eq!(
            AppConfig::from_args(&args(&["--help"]), no_env).unwrap().command,
            Command::Help
        );
    }

    #[test]
    fn rejects_bad_input()
    {
        assert!(AppConfig::from_args(&args(&["tetris"]), no_env).is_err());
        assert!(AppConfig::from_args(&args(&["--speed=3"]), no_env).is_err());
        assert!(AppConfig::from_args(&args(&["--db"]), no_env).is_err());
        assert!(AppConfig::from_args(&args(&["--db="]), no_env).is_err());
        assert!(AppConfig::from_args(&args(&["play", "captcha"]), no_env).is_err());
    }
}

use env_logger::{Builder, Target, WriteStyle};
use log::{LevelFilter, info, warn};
use std::fs::OpenOptions;
use std::path::Path;

/// Send log output to a file. The terminal belongs to the game screens, so
/// nothing is written to stderr while they run.
pub fn initialize_logging(path: &Path) -> Result<(), String>
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("Failed to open log file {}: {err}", path.display()))?;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(true)
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(|err| format!("Failed to initialize logging: {err}"))?;

    info!("Logging to {}", path.display());
    Ok(())
}

fn mask(text: &str) -> String
{
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}***{tail}")
}

pub fn log_auth_event(event: &str, username: &str, success: bool)
{
    if success {
        info!("Auth event: type={event}, user={}, success=true", mask(username));
    } else {
        warn!("Auth event: type={event}, user={}, success=false", mask(username));
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn usernames_are_masked()
    {
        assert_eq!(mask("password"), "pa***rd");
        assert_eq!(mask("bob"), "***");
        assert_eq!(mask(""), "");
        assert_eq!(mask("ñandú-ok"), "ña***ok");
    }

    #[test]
    fn logging_writes_to_the_given_file()
    {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = initialize_logging(file.path());
        // another test in the same binary may have installed a logger first
        assert!(result.is_ok() || result.unwrap_err().contains("initialize"));
    }
}

mod config;
mod credentials;
mod games;
mod logging;

use config::{AppConfig, Command};
use credentials::CredentialStore;
use games::captcha::{self, Picture, PuzzleOutcome};
use games::login::{self, LoginOutcome};
use games::pong;
use games::terminal::TerminalGuard;
use log::{error, info};

fn main()
{
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String>
{
    let config = AppConfig::from_env_args()?;
    match config.command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::List => {
            list_games();
            Ok(())
        }
        Command::Play => {
            logging::initialize_logging(&config.log_path)?;
            play(&config)
        }
        Command::Captcha => {
            logging::initialize_logging(&config.log_path)?;
            solve_captcha(&config)
        }
    }
}

fn play(config: &AppConfig) -> Result<(), String>
{
    let store = CredentialStore::open(&config.db_path).map_err(|err| err.to_string())?;
    let picture = Picture::load(config.picture.as_deref())?;

    let summary = {
        let mut term = TerminalGuard::enter().map_err(|err| err.to_string())?;
        match login::run_login(&mut term, &store, &picture)? {
            LoginOutcome::Quit => None,
            LoginOutcome::Authenticated(username) => {
                info!("Starting match for logged-in player");
                Some((username.clone(), pong::run_pong(&mut term, &username)?))
            }
        }
    };

    if let Some((username, summary)) = summary {
        match summary.winner {
            Some(pong::Side::Left) => println!("{username} wins {} - {}.", summary.left, summary.right),
            Some(pong::Side::Right) => {
                println!("Player 2 wins {} - {}.", summary.right, summary.left)
            }
            None => println!("Match abandoned at {} - {}.", summary.left, summary.right),
        }
    }
    Ok(())
}

fn solve_captcha(config: &AppConfig) -> Result<(), String>
{
    let picture = Picture::load(config.picture.as_deref())?;
    let outcome = {
        let mut term = TerminalGuard::enter().map_err(|err| err.to_string())?;
        captcha::run_puzzle(&mut term, &picture)?
    };
    match outcome {
        PuzzleOutcome::Solved => println!("Picture assembled correctly!"),
        PuzzleOutcome::Abandoned => println!("Puzzle abandoned."),
    }
    Ok(())
}

fn list_games()
{
    println!("Available screens:");
    for game in games::registry() {
        println!("  {:<10} - {}", game.name, game.description);
    }
}

fn print_help()
{
    println!("pong-gate");
    println!("\nUsage:");
    println!("  pong-gate [play|pong]   log in, then play Pong");
    println!("  pong-gate captcha       solve the picture puzzle on its own");
    println!("  pong-gate list");
    println!("\nOptions:");
    println!("  --db=PATH        credential database (default users.db)");
    println!("  --picture=PATH   text file used as the puzzle picture");
    println!("  --log=PATH       log file (default pong-gate.log)");
    println!("\nNotes:");
    println!("  PONG_GATE_DB/PONG_GATE_LOG set the default paths; RUST_LOG sets the log level.");
    println!("  A failed login must be unlocked by solving the puzzle.");
}

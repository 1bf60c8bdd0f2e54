use super::captcha::{self, Picture, PuzzleOutcome};
use super::terminal::TerminalGuard;
use crate::credentials::{CredentialStore, Registration, StoreError};
use crate::logging::log_auth_event;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::info;
use std::time::{Duration, Instant};

const MAX_FIELD_LEN: usize = 32;
const TICK_MS: u64 = 33;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field
{
    Username,
    Password,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Intent
{
    Login,
    Register,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FormAction
{
    None,
    Submit(Intent),
    OpenPuzzle,
    Quit,
}

/// Username/password form. A failed login locks it until the puzzle has
/// been solved.
struct LoginForm
{
    username: String,
    password: String,
    focus: Field,
    message: Option<String>,
    locked: bool,
}

impl LoginForm
{
    fn new() -> Self
    {
        Self {
            username: String::new(),
            password: String::new(),
            focus: Field::Username,
            message: None,
            locked: false,
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> FormAction
    {
        let control = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Esc => return FormAction::Quit,
            KeyCode::Char('c') if control => return FormAction::Quit,
            _ => {}
        }

        if self.locked {
            return match code {
                KeyCode::Enter => FormAction::OpenPuzzle,
                _ => FormAction::None,
            };
        }

        match code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    Field::Username => Field::Password,
                    Field::Password => Field::Username,
                };
            }
            KeyCode::Enter => match self.focus {
                Field::Username => self.focus = Field::Password,
                Field::Password => return FormAction::Submit(Intent::Login),
            },
            KeyCode::F(2) => return FormAction::Submit(Intent::Register),
            KeyCode::Char('r') if control => return FormAction::Submit(Intent::Register),
            KeyCode::Backspace => {
                self.field_mut().pop();
            }
            KeyCode::Char(ch) if !control && !ch.is_control() => {
                let field = self.field_mut();
                if field.chars().count() < MAX_FIELD_LEN {
                    field.push(ch);
                }
            }
            _ => {}
        }
        FormAction::None
    }

    fn field_mut(&mut self) -> &mut String
    {
        match self.focus {
            Field::Username => &mut self.username,
            Field::Password => &mut self.password,
        }
    }

    /// Run the submitted intent against the store. Returns the username
    /// once a login succeeds.
    fn submit(&mut self, store: &CredentialStore, intent: Intent) -> Result<Option<String>, String>
    {
        let username = self.username.trim().to_string();
        match intent {
            Intent::Login => {
                let ok = store
                    .verify(&username, &self.password)
                    .map_err(|err| err.to_string())?;
                log_auth_event("login", &username, ok);
                self.password.clear();
                if ok {
                    return Ok(Some(username));
                }
                self.locked = true;
                self.message = Some(
                    "Wrong username or password. Press Enter to solve the puzzle.".to_string(),
                );
            }
            Intent::Register if store.contains(&username).map_err(|err| err.to_string())? => {
                log_auth_event("register", &username, false);
                self.message = Some(format!("Username '{username}' is already taken."));
            }
            Intent::Register => match store.create(&username, &self.password) {
                Ok(Registration::Created) => {
                    log_auth_event("register", &username, true);
                    self.password.clear();
                    self.focus = Field::Password;
                    self.message = Some(format!(
                        "Account '{username}' created. Enter the password to log in."
                    ));
                }
                Ok(Registration::AlreadyExists) => {
                    log_auth_event("register", &username, false);
                    self.message = Some(format!("Username '{username}' is already taken."));
                }
                Err(err @ (StoreError::InvalidUsername | StoreError::EmptyPassword)) => {
                    self.message = Some(err.to_string());
                }
                Err(err) => return Err(err.to_string()),
            },
        }
        Ok(None)
    }

    fn unlock(&mut self)
    {
        self.locked = false;
        self.focus = Field::Password;
        self.message = Some("Puzzle solved. You may try again.".to_string());
    }

    fn lines(&self) -> Vec<String>
    {
        let marker = |field: Field| if self.focus == field && !self.locked { ">" } else { " " };
        let mut lines = vec![
            "Pong Gate - Login".to_string(),
            String::new(),
            format!("{} Username: {}", marker(Field::Username), self.username),
            format!(
                "{} Password: {}",
                marker(Field::Password),
                "*".repeat(self.password.chars().count())
            ),
            String::new(),
        ];
        if let Some(msg) = &self.message {
            lines.push(msg.clone());
        } else {
            lines.push("Log in to play.".to_string());
        }
        lines.push(String::new());
        if self.locked {
            lines.push("Login locked. Enter opens the puzzle, Esc quits.".to_string());
        } else {
            lines.push("Tab switches fields. Enter logs in. F2 or Ctrl+R registers.".to_string());
            lines.push("Esc quits.".to_string());
        }
        lines
    }
}

pub enum LoginOutcome
{
    Authenticated(String),
    Quit,
}

pub fn run_login(
    term: &mut TerminalGuard,
    store: &CredentialStore,
    picture: &Picture,
) -> Result<LoginOutcome, String>
{
    let mut form = LoginForm::new();
    let mut last_tick = Instant::now();
    let mut dirty = true;

    loop {
        while event::poll(Duration::from_millis(0)).map_err(|err| err.to_string())? {
            let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read().map_err(|err| err.to_string())?
            else {
                continue;
            };
            if kind == KeyEventKind::Release {
                continue;
            }
            dirty = true;

            match form.handle_key(code, modifiers) {
                FormAction::None => {}
                FormAction::Quit => return Ok(LoginOutcome::Quit),
                FormAction::Submit(intent) => {
                    if let Some(username) = form.submit(store, intent)? {
                        return Ok(LoginOutcome::Authenticated(username));
                    }
                }
                FormAction::OpenPuzzle => match captcha::run_puzzle(term, picture)? {
                    PuzzleOutcome::Solved => {
                        info!("Login unlocked by puzzle");
                        form.unlock();
                    }
                    PuzzleOutcome::Abandoned => {
                        info!("Puzzle abandoned, leaving");
                        return Ok(LoginOutcome::Quit);
                    }
                },
            }
        }

        if dirty && last_tick.elapsed() >= Duration::from_millis(TICK_MS) {
            term.draw_lines(&form.lines())?;
            dirty = false;
            last_tick = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

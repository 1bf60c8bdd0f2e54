pub mod captcha;
pub mod login;
pub mod pong;
pub mod terminal;

pub struct GameDescriptor
{
    pub name: &'static str,
    pub description: &'static str,
}

pub fn registry() -> Vec<GameDescriptor>
{
    vec![GameDescriptor {
        name: "pong",
        description: "Two-player Pong behind a login; first to 10 wins",
    },
    GameDescriptor {
        name: "captcha",
        description: "Drag four picture pieces into place",
    }]
}

use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::Sha256;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Hash a password with a fresh random salt.
///
/// The result is self-describing (`pbkdf2-sha256$<rounds>$<salt>$<digest>`)
/// so it fits the single hash column of the users table.
pub fn hash_password(password: &str, iterations: u32) -> String
{
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill(&mut salt);
    let digest = derive(password, &salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(&salt),
        hex::encode(digest)
    )
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, String>
{
    let parsed = ParsedHash::parse(stored)?;
    let digest = derive(password, &parsed.salt, parsed.iterations);
    Ok(constant_time_eq(&digest, &parsed.digest))
}

struct ParsedHash
{
    iterations: u32,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl ParsedHash
{
    fn parse(stored: &str) -> Result<Self, String>
    {
        let mut parts = stored.split('$');
        let scheme = parts.next().unwrap_or_default();
        if scheme != SCHEME {
            return Err(format!("unknown hash scheme '{scheme}'"));
        }
        let iterations = parts
            .next()
            .ok_or_else(|| "missing iteration count".to_string())?
            .parse::<u32>()
            .map_err(|_| "iteration count must be a number".to_string())?;
        if iterations == 0 {
            return Err("iteration count must be positive".to_string());
        }
        let salt = parts
            .next()
            .ok_or_else(|| "missing salt".to_string())
            .and_then(|value| hex::decode(value).map_err(|err| err.to_string()))?;
        let digest = parts
            .next()
            .ok_or_else(|| "missing digest".to_string())
            .and_then(|value| hex::decode(value).map_err(|err| err.to_string()))?;
        if parts.next().is_some() || digest.len() != DIGEST_LEN {
            return Err("malformed digest".to_string());
        }
        Ok(Self {
            iterations,
            salt,
            digest,
        })
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN]
{
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut digest);
    digest
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool
{
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn hash_round_trip_accepts_only_the_original_password()
    {
        let stored = hash_password("hunter2", 10);
        assert!(stored.starts_with("pbkdf2-sha256$10$"));
        assert_eq!(verify_password("hunter2", &stored), Ok(true));
        assert_eq!(verify_password("hunter3", &stored), Ok(false));
        assert_eq!(verify_password("", &stored), Ok(false));
    }

    #[test]
    fn same_password_gets_a_different_salt()
    {
        let first = hash_password("secret", 10);
        let second = hash_password("secret", 10);
        assert_ne!(first, second);
        assert_eq!(verify_password("secret", &second), Ok(true));
    }

    #[test]
    fn malformed_hashes_are_rejected()
    {
        assert!(verify_password("x", "").is_err());
        assert!(verify_password("x", "md5$1$00$00").is_err());
        assert!(verify_password("x", "pbkdf2-sha256$0$00$00").is_err());
        assert!(verify_password("x", "pbkdf2-sha256$ten$00$00").is_err());
        assert!(verify_password("x", "pbkdf2-sha256$10$zz$00").is_err());
        assert!(verify_password("x", "pbkdf2-sha256$10$00$0011").is_err());
    }

    #[test]
    fn constant_time_eq_compares_length_and_content()
    {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}

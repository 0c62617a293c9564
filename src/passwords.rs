use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 512;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be between {min} and {max} characters")]
    Length { min: usize, max: usize },

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to parse password hash: {0}")]
    InvalidHash(String),

    #[error("Invalid argon2 parameters: {0}")]
    Params(String),
}

pub type Result<T> = std::result::Result<T, PasswordError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub ok: bool,
    /// The hash was made with other parameters than the current ones.
    pub needs_rehash: bool,
}

/// Argon2id hashing with fixed cost parameters.
#[derive(Clone)]
pub struct Passwords {
    a2: Argon2<'static>,
}

impl Passwords {
    pub fn new(mem_kib: u32, iters: u32, lanes: u32) -> Result<Self> {
        let params = Params::new(mem_kib, iters, lanes, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Self {
            a2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// 64 MiB, two passes, one lane.
    pub fn interactive() -> Self {
        Self {
            a2: Argon2::new(Algorithm::Argon2id, Version::V0x13, interactive_params()),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        guard_length(password)?;
        let salt = SaltString::generate(&mut OsRng);
        let phc = self
            .a2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(phc.to_string())
    }

    pub fn verify(&self, password: &str, pw_hash: &str) -> Result<Verification> {
        let parsed =
            PasswordHash::new(pw_hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;
        let ok = self
            .a2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        let params = self.a2.params();
        let needs_rehash = ok
            && !(parsed.algorithm == Algorithm::Argon2id.ident()
                && parsed.version == Some(Version::V0x13.into())
                && parsed.params.get_decimal("m") == Some(params.m_cost())
                && parsed.params.get_decimal("t") == Some(params.t_cost())
                && parsed.params.get_decimal("p") == Some(params.p_cost()));
        Ok(Verification { ok, needs_rehash })
    }
}

fn interactive_params() -> Params {
    Params::new(65536, 2, 1, None).unwrap_or_default()
}

fn guard_length(s: &str) -> Result<()> {
    let len = s.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(PasswordError::Length {
            min: MIN_PASSWORD_LEN,
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

const MAX_LENGTH: usize = 150;

/// Letters, digits and `@ . + - _`, at most 150 characters.
#[derive(Debug, Clone)]
pub struct Username(String);

impl Username{
    pub fn parse(username: String) -> Result<Username, String>{
        let trimmed = username.trim();

        if trimmed.is_empty() {
            return Err("username must not be empty".to_string())
        }

        if trimmed.chars().count() > MAX_LENGTH {
            return Err(format!("username must be at most {} characters", MAX_LENGTH))
        }

        let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
        if !trimmed.chars().all(allowed) {
            return Err(format!("{} contains characters that are not allowed", trimmed))
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of credential an account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    #[default]
    Password,
    SshKey,
    AccessKey,
    Token,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::SshKey => "ssh_key",
            Self::AccessKey => "access_key",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::fmt::{Debug, Formatter};

use serde::{Serialize, Serializer};

/// SmartHub login.
#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    #[serde(rename = "userId")]
    pub user_id: String,

    #[serde(rename = "password")]
    pub password: Password,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, password: impl Into<Password>) -> Self {
        Self { user_id: user_id.into(), password: password.into() }
    }
}

/// Secret string which only reveals itself to the form encoder.
#[derive(Clone)]
pub struct Password(String);

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self(password)
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self(password.to_owned())
    }
}

impl Password {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Serialize for Password {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

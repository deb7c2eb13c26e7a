use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String, // assigned once, at creation
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String, // stored and returned as given
}

/// Input for `createUser`. Omitted fields are empty strings.
#[derive(Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl User {
    /// Builds a user from the input with a freshly generated id.
    pub fn from_input(input: NewUser) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            password: input.password,
        }
    }
}

/// Row shape of the `todos` table. Only its schema is managed here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub done: bool,
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_input_copies_fields_and_assigns_id() {
        let user = User::from_input(NewUser {
            username: "alice".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            email: "a@x.com".into(),
            password: "p".into(),
        });
        assert_eq!(user.username, "alice");
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.last_name, "Liddell");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.password, "p");
        assert!(Uuid::parse_str(&user.id).is_ok());
    }

    #[test]
    fn missing_input_fields_default_to_empty() {
        let input: NewUser =
            serde_json::from_str(r#"{"username":"alice","email":"a@x.com","password":"p"}"#)
                .unwrap();
        assert_eq!(input.username, "alice");
        assert_eq!(input.first_name, "");
        assert_eq!(input.last_name, "");
    }

    #[test]
    fn caller_supplied_id_is_ignored() {
        let input: NewUser =
            serde_json::from_str(r#"{"id":"mine","username":"bob"}"#).unwrap();
        let user = User::from_input(input);
        assert_ne!(user.id, "mine");
    }

    #[test]
    fn debug_hides_input_password() {
        let input = NewUser {
            password: "hunter2".into(),
            ..Default::default()
        };
        assert!(!format!("{input:?}").contains("hunter2"));
    }
}

use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::any::AnyRow;

use super::score::required;
use super::*;
use crate::database_keys;

/// Public view of a user; never carries the password.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// A stored user together with its credential.
#[derive(Clone, Debug)]
pub struct UserAccount {
    pub user: User,
    password: String,
}

impl UserAccount {
    pub fn password_matches(&self, password: &str) -> bool {
        self.password == password
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Registration {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_owned()),
            email: Some(email.to_owned()),
            password: Some(password.to_owned()),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_owned()),
            password: Some(password.to_owned()),
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}

const SELECT_ACCOUNT: &str =
    "SELECT user_id, username, email, password, created_at, last_login FROM users";

fn account_from_row(row: &AnyRow) -> Result<UserAccount, StorageError> {
    let created_at = row.try_get_unchecked::<i64, usize>(4)?;
    let last_login = row.try_get_unchecked::<Option<i64>, usize>(5)?;

    Ok(UserAccount {
        user: User {
            user_id: row.try_get_unchecked::<String, usize>(0)?,
            username: row.try_get_unchecked::<String, usize>(1)?,
            email: row.try_get_unchecked::<String, usize>(2)?,
            created_at: timestamp_from_millis(created_at)?,
            last_login: last_login.map(timestamp_from_millis).transpose()?,
        },
        password: row.try_get_unchecked::<String, usize>(3)?,
    })
}

/// User records, keyed by a server-generated id.
pub struct IdentityStore {
    database: DatabasePool,
}

impl IdentityStore {
    pub fn new(database: DatabasePool) -> Self {
        Self { database }
    }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<UserAccount>, StorageError> {
        let row = sqlx::query(&format!("{} WHERE {} = $1", SELECT_ACCOUNT, column))
            .bind(value)
            .fetch_optional(&self.database)
            .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, StorageError> {
        self.find_by("user_id", user_id).await
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, StorageError> {
        self.find_by("username", username).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StorageError> {
        self.find_by("email", email).await
    }

    /// Inserts a new user without checking for duplicates;
    /// the unique constraints reject a username or email that is in use.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, StorageError> {
        let user = User {
            user_id: database_keys::generate_user_id(),
            username: username.to_owned(),
            email: email.to_owned(),
            created_at: now()?,
            last_login: None,
        };

        sqlx::query(
            "INSERT INTO users (user_id, username, email, password, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(password)
        .bind(user.created_at.timestamp_millis())
        .execute(&self.database)
        .await?;

        Ok(user)
    }

    /// Sets the last login of a user to now and returns that time.
    pub async fn touch_last_login(&self, user_id: &str) -> Result<DateTime<Utc>, StorageError> {
        let last_login = now()?;
        let response = sqlx::query("UPDATE users SET last_login = $1 WHERE user_id = $2")
            .bind(last_login.timestamp_millis())
            .bind(user_id)
            .execute(&self.database)
            .await?;

        if response.rows_affected() == 0 {
            return Err(StorageError::UnknownUser {
                user_id: user_id.to_owned(),
            });
        }
        Ok(last_login)
    }

    /// The account error for a username or email that is already in use, if any.
    async fn conflict(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<AccountError>, StorageError> {
        if self.find_by_username(username).await?.is_some() {
            return Ok(Some(AccountError::UsernameTaken {
                username: username.to_owned(),
            }));
        }
        if self.find_by_email(email).await?.is_some() {
            return Ok(Some(AccountError::EmailTaken {
                email: email.to_owned(),
            }));
        }
        Ok(None)
    }

    /// Inserts a user whose username and email were found free.
    /// A concurrent registration may take them first, in which case the
    /// unique constraints reject the insert and the conflict is reported instead.
    async fn insert_new(&self, username: &str, email: &str, password: &str) -> RequestResult<User> {
        match self.create(username, email, password).await {
            Ok(user) => Ok(user),
            Err(StorageError::Database(sqlx::Error::Database(error))) => {
                match self.conflict(username, email).await? {
                    Some(conflict) => Err(conflict.into()),
                    None => Err(StorageError::Database(sqlx::Error::Database(error)).into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Registers a new user.
    /// Returns an error if the username or the email is already in use.
    pub async fn register(&self, registration: Registration) -> RequestResult<User> {
        let username =
            required(registration.username).ok_or(ValidationError::MissingUsername)?;
        let email = required(registration.email).ok_or(ValidationError::MissingEmail)?;
        let password = registration
            .password
            .filter(|password| !password.trim().is_empty())
            .ok_or(ValidationError::MissingPassword)?;

        if !is_valid_email(&email) {
            return Err(ValidationError::InvalidEmail { email }.into());
        }

        if let Some(conflict) = self.conflict(&username, &email).await? {
            return Err(conflict.into());
        }

        let user = self.insert_new(&username, &email, &password).await?;
        log::info!("registered user {} ({})", user.username, user.user_id);
        Ok(user)
    }

    /// Checks the credentials and records the login.
    /// An unknown username and a wrong password fail the same way.
    pub async fn login(&self, credentials: Credentials) -> RequestResult<User> {
        let username = required(credentials.username).ok_or(ValidationError::MissingUsername)?;
        let password = credentials
            .password
            .filter(|password| !password.is_empty())
            .ok_or(ValidationError::MissingPassword)?;

        let account = match self.find_by_username(&username).await? {
            Some(account) if account.password_matches(&password) => account,
            _ => return Err(AccountError::InvalidCredentials.into()),
        };

        let mut user = account.user;
        user.last_login = Some(self.touch_last_login(&user.user_id).await?);
        log::info!("user {} logged in", user.user_id);
        Ok(user)
    }
}

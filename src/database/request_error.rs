use rocket::{
    http::Status,
    request::Request,
    response::{self, status, Responder},
    serde::{json::Json, Serialize},
};
use thiserror::Error;

/// The caller sent an incomplete or malformed request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("userId is required")]
    MissingUserId,
    #[error("gameType is required")]
    MissingGameType,
    #[error("score is required")]
    MissingScore,
    #[error("username is required")]
    MissingUsername,
    #[error("email is required")]
    MissingEmail,
    #[error("password is required")]
    MissingPassword,
    #[error("invalid email address: {email}")]
    InvalidEmail { email: String },
    #[error("malformed request body: {reason}")]
    MalformedBody { reason: String },
}

/// The store rejected a write or could not be read.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no user with the id {user_id} exists")]
    UnknownUser { user_id: String },
    #[error("stored timestamp {millis} is out of range")]
    InvalidTimestamp { millis: i64 },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("the username {username} is already taken")]
    UsernameTaken { username: String },
    #[error("the email {email} is already registered")]
    EmailTaken { email: String },
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("no user with the id {user_id} exists")]
    NoSuchUser { user_id: String },
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("account error: {0}")]
    Account(#[from] AccountError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for RequestError {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(error.into())
    }
}

impl RequestError {
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::Account(AccountError::InvalidCredentials) => Status::Unauthorized,
            Self::Account(AccountError::NoSuchUser { .. }) => Status::NotFound,
            Self::Account(_) => Status::Conflict,
            Self::Storage(StorageError::UnknownUser { .. }) => Status::NotFound,
            Self::Storage(_) => Status::InternalServerError,
        }
    }

    /// Message safe to show to a client; database internals stay in the log.
    fn public_message(&self) -> String {
        match self {
            Self::Storage(StorageError::UnknownUser { .. }) => self.to_string(),
            Self::Storage(_) => "storage error".to_owned(),
            _ => self.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
struct ErrorBody {
    error: String,
}

impl<'r> Responder<'r, 'static> for RequestError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            log::error!("{} {} failed: {}", request.method(), request.uri(), self);
        } else {
            log::warn!("{} {} rejected: {}", request.method(), request.uri(), self);
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        status::Custom(status, Json(body)).respond_to(request)
    }
}

pub type RequestResult<T, E = RequestError> = std::result::Result<T, E>;

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    User,
    Item,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::User => f.write_str("user"),
            Axis::Item => f.write_str("item"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// The interaction matrix has no observed rating, so the global mean is undefined.
    #[error("interaction matrix has no observed ratings")]
    DegenerateInput,
    #[error("{axis} index {index} out of range (len {len})")]
    IndexOutOfRange { axis: Axis, index: usize, len: usize },
    /// A 1-based user identifier outside `[1, n_users]`.
    #[error("user id {user_id} out of range (valid ids are 1..={n_users})")]
    UserOutOfRange { user_id: usize, n_users: usize },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("rating at ({user}, {item}) is not a finite number")]
    NonFiniteRating { user: usize, item: usize },
}

impl ModelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

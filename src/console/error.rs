//! Console lifecycle errors

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The process already has a console session
    #[error("A console is already attached to this process")]
    AlreadyAttached,

    #[error("Failed to attach console: {0}")]
    AttachFailed(#[source] io::Error),

    #[error("Failed to detach console: {0}")]
    DetachFailed(#[source] io::Error),

    #[error("Failed to set console title: {0}")]
    TitleFailed(#[source] io::Error),

    #[error("No console is attached")]
    NotAttached,
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

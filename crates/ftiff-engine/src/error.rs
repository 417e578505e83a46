// SPDX-License-Identifier: MIT

//! Error types for the level state machine and recovery driver.

use fti_ff_core::FtiError;
use fti_ff_store::{BlockError, DescriptorError, FileIoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("core error: {0}")]
    Core(#[from] FtiError),
    #[error("block model error: {0}")]
    Block(#[from] BlockError),
    #[error("file io error: {0}")]
    FileIo(#[from] FileIoError),
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("level state error: {0}")]
    Level(#[from] crate::levels::LevelError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no level is ready for recovery")]
    Unrecoverable,
    #[error("variable {id} recovered {recovered} bytes, declared size is {declared}")]
    SizeMismatch { id: u32, recovered: u64, declared: u64 },
}

impl EngineError {
    pub fn to_return_code(&self) -> fti_ff_core::ReturnCode {
        match self {
            EngineError::FileIo(FileIoError::Io(_)) => fti_ff_core::ReturnCode::NoSuchCheckpoint,
            _ => fti_ff_core::ReturnCode::Unrecoverable,
        }
    }
}

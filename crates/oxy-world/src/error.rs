// error.rs — world load errors

use std::path::PathBuf;

use oxy_common::error::BspError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("bad map name {0:?}")]
    BadMapName(String),

    #[error("map file {} not found", .0.display())]
    MapNotFound(PathBuf),

    #[error(transparent)]
    Bsp(#[from] BspError),

    #[error("config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type WorldResult<T> = Result<T, WorldError>;

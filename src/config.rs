//! Runtime configuration shared by the server and client binaries

use std::path::Path;

use crate::error::ConfigError;

/// Host both binaries bind/connect to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Channel buffer size for commands to the ChatServer actor
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Name candidates a client tries before giving up
pub const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Leading character that marks raw protocol input on the client
pub const ESCAPE_CHAR: char = '*';

/// Lowest port accepted on the server command line
pub const MIN_PORT: u16 = 1024;

/// Load the shared secret: the first line of the file, without its newline
///
/// An empty file yields an empty secret.
pub fn load_secret(path: &Path) -> Result<String, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::SecretFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(contents.lines().next().unwrap_or_default().to_string())
}

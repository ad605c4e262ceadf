//! # Errors

/// kilo's error type.
#[derive(Debug)]
pub enum Error {
    /// Wrapper around `std::io::Error`.
    Io(std::io::Error),
    /// Error returned when the window size obtained through a system call is invalid.
    InvalidWindowSize,
    /// Error setting or retrieving the cursor position.
    CursorPosition,
    /// Configuration error. The three attributes correspond to the file path, the 1-based line
    /// number and the error message.
    Config(std::path::PathBuf, usize, String),
    /// An unrecognized command-line option was given.
    UnrecognizedOption(String),
    /// Too many command-line arguments were given. The attribute is the total number of
    /// arguments (excluding the program name).
    TooManyArguments(usize),
}

impl From<std::io::Error> for Error {
    /// Convert an IO Error into a kilo Error.
    fn from(err: std::io::Error) -> Self { Self::Io(err) }
}

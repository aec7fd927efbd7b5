use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid combination of command line arguments.
    Usage,
    /// A tool, directory, environment variable or package the build needs is absent.
    Prerequisite,
    /// Something we read (config, CMake file) did not have the expected shape.
    Parse,
    /// An external process could not be run or exited non-zero.
    Process,
    /// The executable to spawn does not exist.
    ToolMissing,
    Io,
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
}

impl Error {
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Other, msg)
    }

    pub fn new<M: Into<String>>(kind: ErrorKind, msg: M) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    pub fn usage<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Usage, msg)
    }

    pub fn prerequisite<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Prerequisite, msg)
    }

    pub fn parse<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Parse, msg)
    }

    pub fn process<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Process, msg)
    }

    pub fn tool_missing<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::ToolMissing, msg)
    }

    pub fn io<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::msg(format!("json error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

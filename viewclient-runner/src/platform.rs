use std::fmt;

/// Name of the interpreter able to run the tools through its plugin mechanism.
const INTERPRETER: &str = "monkeyrunner";

/// Family of the host operating system, as far as launching the tools is concerned
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Platform {
    /// Windows: no shebang support, the interpreter is a batch file
    Windows,

    /// Every other platform
    Unix,
}

impl Platform {
    /// Returns the platform the launcher was compiled for
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Whether a script can be executed directly thanks to its `#!` line
    pub const fn supports_shebang(self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// File name of the interpreter to look for in the search path
    pub fn interpreter_file_name(self) -> String {
        match self {
            Self::Windows => format!("{INTERPRETER}.bat"),
            Self::Unix => INTERPRETER.to_owned(),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("Windows"),
            Self::Unix => f.write_str(std::env::consts::OS),
        }
    }
}

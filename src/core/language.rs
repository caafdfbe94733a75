//! Language tags and related build knobs.

use serde::{Deserialize, Serialize};

/// Source language of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// C language (default)
    #[default]
    C,
    /// C++ language
    #[serde(alias = "cpp", alias = "cxx", alias = "c++")]
    Cxx,
    /// D language
    D,
}

impl Language {
    /// Get the language name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
            Language::D => "d",
        }
    }

    /// Key under `compilers.<language>` in the configuration store.
    pub fn config_key(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "cpp",
            Language::D => "d",
        }
    }

    /// Default source file extensions for this language.
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            Language::C => &["c"],
            Language::Cxx => &["cpp", "cc", "cxx"],
            Language::D => &["d"],
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimisation level requested for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    /// No optimisation (default for debug configs)
    #[default]
    None,
    /// Balanced optimisation
    Balanced,
    /// Optimise for speed
    Speed,
    /// Optimise for size
    Size,
}

impl OptLevel {
    /// GCC/Clang style flag for this level.
    pub fn as_gnu_flag(&self) -> &'static str {
        match self {
            OptLevel::None => "-O0",
            OptLevel::Balanced => "-O2",
            OptLevel::Speed => "-O3",
            OptLevel::Size => "-Os",
        }
    }
}

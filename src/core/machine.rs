//! Machine and cross-compilation target descriptors.
//!
//! A [`MachineDescriptor`] identifies a host or target as the tuple
//! (os, arch, vendor, env, abi), with "unknown" as a valid sentinel for the
//! trailing fields. Descriptors are interned in a [`MachineRegistry`] at
//! startup and immutable afterwards; lookups match a parsed query tuple
//! against the registry.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::language::Language;

/// Sentinel for absent tuple fields.
pub const UNKNOWN: &str = "unknown";

/// Byte order, derived from the architecture tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Derive byte order from an architecture tag. Everything Drydock
    /// targets today is little-endian except explicit big-endian tags.
    pub fn from_arch(arch: &str) -> Self {
        match arch {
            "powerpc" | "powerpc64" | "s390x" | "sparc64" | "m68k" => Endianness::Big,
            _ => Endianness::Little,
        }
    }
}

/// Filename affixes applied to produced binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affixes {
    pub exe_prefix: &'static str,
    pub exe_suffix: &'static str,
    pub shared_prefix: &'static str,
    pub shared_suffix: &'static str,
    pub static_prefix: &'static str,
    pub static_suffix: &'static str,
}

impl Affixes {
    /// Unix-style affixes (`libfoo.so`, `libfoo.a`, bare executables).
    pub fn unix() -> Self {
        Affixes {
            exe_prefix: "",
            exe_suffix: "",
            shared_prefix: "lib",
            shared_suffix: ".so",
            static_prefix: "lib",
            static_suffix: ".a",
        }
    }

    /// Windows-style affixes.
    pub fn windows() -> Self {
        Affixes {
            exe_prefix: "",
            exe_suffix: ".exe",
            shared_prefix: "",
            shared_suffix: ".dll",
            static_prefix: "",
            static_suffix: ".lib",
        }
    }

    /// macOS-style affixes.
    pub fn darwin() -> Self {
        Affixes {
            shared_suffix: ".dylib",
            ..Affixes::unix()
        }
    }
}

/// A host or cross-compilation target.
///
/// Identity is the (os, arch, vendor, env, abi) tuple. Instances are created
/// once per distinct tuple at registry construction and never mutated.
#[derive(Debug, Clone)]
pub struct MachineDescriptor {
    pub os: String,
    pub arch: String,
    pub vendor: String,
    pub env: String,
    pub abi: String,
    pub endianness: Endianness,
    /// Per-machine overrides for logical binary names ("gcc" -> custom path).
    pub binary_overrides: HashMap<String, PathBuf>,
    /// Extra compile arguments injected for a language on this machine.
    pub extra_compile_args: HashMap<Language, Vec<String>>,
    /// Extra link arguments injected for a language on this machine.
    pub extra_link_args: HashMap<Language, Vec<String>>,
    /// Extra defines injected for a language on this machine.
    pub extra_defines: HashMap<Language, Vec<(String, Option<String>)>>,
    /// Filename affixes for binaries produced for this machine.
    pub affixes: Affixes,
}

impl MachineDescriptor {
    /// Create a descriptor with no overrides.
    pub fn new(os: &str, arch: &str, vendor: &str, env: &str, abi: &str, affixes: Affixes) -> Self {
        MachineDescriptor {
            os: os.to_string(),
            arch: arch.to_string(),
            vendor: vendor.to_string(),
            env: env.to_string(),
            abi: abi.to_string(),
            endianness: Endianness::from_arch(arch),
            binary_overrides: HashMap::new(),
            extra_compile_args: HashMap::new(),
            extra_link_args: HashMap::new(),
            extra_defines: HashMap::new(),
            affixes,
        }
    }

    /// The identity tuple.
    pub fn tuple(&self) -> (&str, &str, &str, &str, &str) {
        (&self.os, &self.arch, &self.vendor, &self.env, &self.abi)
    }

    /// Resolve a logical binary name to the overridden path, or the default.
    pub fn binary_path(&self, logical: &str, default: &str) -> PathBuf {
        self.binary_overrides
            .get(logical)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(default))
    }

    /// Extra compile arguments for a language, if any.
    pub fn compile_args(&self, lang: Language) -> &[String] {
        self.extra_compile_args
            .get(&lang)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Extra link arguments for a language, if any.
    pub fn link_args(&self, lang: Language) -> &[String] {
        self.extra_link_args
            .get(&lang)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Extra defines for a language, if any.
    pub fn defines(&self, lang: Language) -> &[(String, Option<String>)] {
        self.extra_defines
            .get(&lang)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl fmt::Display for MachineDescriptor {
    /// Renders os-arch plus trailing non-"unknown" fields. Rendering stops
    /// at the first "unknown" so the string never contains gaps.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)?;
        for field in [&self.vendor, &self.env, &self.abi] {
            if field == UNKNOWN {
                break;
            }
            write!(f, "-{}", field)?;
        }
        Ok(())
    }
}

/// A parsed machine tuple used to query the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineQuery {
    pub os: String,
    pub arch: String,
    pub vendor: String,
    pub env: String,
    pub abi: String,
}

/// Error parsing a machine tuple string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineParseError {
    #[error("machine tuple `{0}` has no architecture; expected at least `os-arch`")]
    MissingArch(String),
    #[error("machine tuple is empty")]
    Empty,
}

impl MachineQuery {
    /// Parse a tuple string of up to five `-`-separated fields
    /// (os, arch, vendor, env, abi). Trailing fields default to "unknown";
    /// os and arch are mandatory.
    pub fn parse(s: &str) -> Result<Self, MachineParseError> {
        if s.is_empty() {
            return Err(MachineParseError::Empty);
        }

        let mut fields = s.splitn(5, '-');
        let os = fields.next().unwrap_or_default();
        let arch = match fields.next() {
            Some(a) if !a.is_empty() => a,
            _ => return Err(MachineParseError::MissingArch(s.to_string())),
        };

        let mut tail = [UNKNOWN; 3];
        for slot in tail.iter_mut() {
            match fields.next() {
                Some(f) if !f.is_empty() => *slot = f,
                _ => break,
            }
        }

        Ok(MachineQuery {
            os: os.to_string(),
            arch: arch.to_string(),
            vendor: tail[0].to_string(),
            env: tail[1].to_string(),
            abi: tail[2].to_string(),
        })
    }

    /// Whether this query matches a registered descriptor.
    ///
    /// A query field that is "unknown" acts as a wildcard; a concrete field
    /// must equal the candidate's field exactly. os and arch are always
    /// concrete after a successful parse.
    fn matches(&self, desc: &MachineDescriptor) -> bool {
        fn field_ok(query: &str, candidate: &str) -> bool {
            query == UNKNOWN || query == candidate
        }

        self.os == desc.os
            && self.arch == desc.arch
            && field_ok(&self.vendor, &desc.vendor)
            && field_ok(&self.env, &desc.env)
            && field_ok(&self.abi, &desc.abi)
    }
}

/// Registry of interned machine descriptors.
///
/// Populated once at startup; descriptors are immutable and live for the
/// registry's lifetime. First match in registration order wins.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: Vec<MachineDescriptor>,
}

impl MachineRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        MachineRegistry::default()
    }

    /// A registry seeded with the machines Drydock knows out of the box.
    pub fn with_builtin() -> Self {
        let mut reg = MachineRegistry::new();
        for (os, arch, vendor, env, affixes) in [
            ("linux", "x86_64", UNKNOWN, "gnu", Affixes::unix()),
            ("linux", "aarch64", UNKNOWN, "gnu", Affixes::unix()),
            ("linux", "riscv64", UNKNOWN, "gnu", Affixes::unix()),
            ("macos", "x86_64", "apple", UNKNOWN, Affixes::darwin()),
            ("macos", "aarch64", "apple", UNKNOWN, Affixes::darwin()),
            ("windows", "x86_64", "pc", "gnu", Affixes::windows()),
        ] {
            reg.register(MachineDescriptor::new(os, arch, vendor, env, UNKNOWN, affixes));
        }

        // Freestanding embedded target served by the embedded toolchain
        // variant. No OS, Cortex-M class core.
        reg.register(MachineDescriptor::new(
            "none",
            "armv7m",
            UNKNOWN,
            "eabi",
            UNKNOWN,
            Affixes {
                exe_suffix: ".elf",
                ..Affixes::unix()
            },
        ));

        reg
    }

    /// Register a descriptor. Duplicate tuples are ignored so descriptors
    /// stay interned per identity.
    pub fn register(&mut self, desc: MachineDescriptor) {
        if self.machines.iter().any(|m| m.tuple() == desc.tuple()) {
            return;
        }
        self.machines.push(desc);
    }

    /// Look up a descriptor by exact/partial tuple match.
    pub fn lookup(&self, query: &MachineQuery) -> Option<&MachineDescriptor> {
        self.machines.iter().find(|m| query.matches(m))
    }

    /// Parse a tuple string and look it up in one step.
    pub fn parse(&self, s: &str) -> Result<Option<&MachineDescriptor>, MachineParseError> {
        Ok(self.lookup(&MachineQuery::parse(s)?))
    }

    /// All registered descriptors, for "unknown target" diagnostics.
    pub fn known(&self) -> impl Iterator<Item = &MachineDescriptor> {
        self.machines.iter()
    }

    /// The descriptor matching the host this process runs on, if registered.
    pub fn host(&self) -> Option<&MachineDescriptor> {
        let query = MachineQuery {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            vendor: UNKNOWN.to_string(),
            env: UNKNOWN.to_string(),
            abi: UNKNOWN.to_string(),
        };
        self.lookup(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_tuple() {
        let q = MachineQuery::parse("linux-x86_64-unknown-gnu").unwrap();
        assert_eq!(q.os, "linux");
        assert_eq!(q.arch, "x86_64");
        assert_eq!(q.vendor, "unknown");
        assert_eq!(q.env, "gnu");
        assert_eq!(q.abi, "unknown");
    }

    #[test]
    fn test_parse_requires_arch() {
        assert_eq!(
            MachineQuery::parse("linux"),
            Err(MachineParseError::MissingArch("linux".to_string()))
        );
        assert_eq!(MachineQuery::parse(""), Err(MachineParseError::Empty));
    }

    #[test]
    fn test_parse_error_messages() {
        assert_eq!(
            MachineQuery::parse("linux").unwrap_err().to_string(),
            "machine tuple `linux` has no architecture; expected at least `os-arch`"
        );
        assert_eq!(
            MachineQuery::parse("").unwrap_err().to_string(),
            "machine tuple is empty"
        );
    }

    #[test]
    fn test_lookup_wildcards() {
        let reg = MachineRegistry::with_builtin();

        // os-arch only: vendor/env/abi are wildcards.
        let m = reg.parse("linux-x86_64").unwrap().unwrap();
        assert_eq!(m.env, "gnu");

        // Concrete env must match exactly.
        assert!(reg.parse("linux-x86_64-unknown-musl").unwrap().is_none());
    }

    #[test]
    fn test_lookup_unmatched_is_none() {
        let reg = MachineRegistry::with_builtin();
        assert!(reg.parse("plan9-mips").unwrap().is_none());
        assert!(reg.known().count() > 0);
    }

    #[test]
    fn test_display_stops_at_unknown() {
        let m = MachineDescriptor::new("linux", "x86_64", UNKNOWN, "gnu", UNKNOWN, Affixes::unix());
        // env is known but vendor is not; rendering stops at the first
        // unknown so no gap appears.
        assert_eq!(m.to_string(), "linux-x86_64");

        let m = MachineDescriptor::new("macos", "aarch64", "apple", UNKNOWN, UNKNOWN, Affixes::darwin());
        assert_eq!(m.to_string(), "macos-aarch64-apple");
    }

    #[test]
    fn test_registry_interns_by_tuple() {
        let mut reg = MachineRegistry::new();
        reg.register(MachineDescriptor::new("linux", "x86_64", UNKNOWN, "gnu", UNKNOWN, Affixes::unix()));
        reg.register(MachineDescriptor::new("linux", "x86_64", UNKNOWN, "gnu", UNKNOWN, Affixes::unix()));
        assert_eq!(reg.known().count(), 1);
    }

    #[test]
    fn test_binary_override() {
        let mut m =
            MachineDescriptor::new("none", "armv7m", UNKNOWN, "eabi", UNKNOWN, Affixes::unix());
        m.binary_overrides
            .insert("gcc".to_string(), PathBuf::from("arm-none-eabi-gcc"));

        assert_eq!(
            m.binary_path("gcc", "gcc"),
            PathBuf::from("arm-none-eabi-gcc")
        );
        assert_eq!(m.binary_path("ar", "ar"), PathBuf::from("ar"));
    }

    #[test]
    fn test_endianness_from_arch() {
        assert_eq!(Endianness::from_arch("x86_64"), Endianness::Little);
        assert_eq!(Endianness::from_arch("s390x"), Endianness::Big);
    }
}

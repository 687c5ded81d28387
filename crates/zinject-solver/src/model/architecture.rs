//! Operating system and CPU identification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Os {
    #[default]
    All,
    Linux,
    Solaris,
    FreeBsd,
    MacOsX,
    Darwin,
    Cygwin,
    Posix,
    Windows,
    Unknown,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::All => "*",
            Os::Linux => "Linux",
            Os::Solaris => "Solaris",
            Os::FreeBsd => "FreeBSD",
            Os::MacOsX => "MacOSX",
            Os::Darwin => "Darwin",
            Os::Cygwin => "Cygwin",
            Os::Posix => "POSIX",
            Os::Windows => "Windows",
            Os::Unknown => "unknown",
        }
    }

    pub fn from_token(token: &str) -> Os {
        match token {
            "*" | "" => Os::All,
            "Linux" => Os::Linux,
            "Solaris" => Os::Solaris,
            "FreeBSD" => Os::FreeBsd,
            "MacOSX" => Os::MacOsX,
            "Darwin" => Os::Darwin,
            "Cygwin" => Os::Cygwin,
            "POSIX" => Os::Posix,
            "Windows" => Os::Windows,
            _ => Os::Unknown,
        }
    }

    pub fn is_unix_like(&self) -> bool {
        matches!(
            self,
            Os::Linux | Os::Solaris | Os::FreeBsd | Os::MacOsX | Os::Darwin | Os::Cygwin | Os::Posix
        )
    }

    /// Whether something built for `self` can run on `system`
    pub fn is_compatible(&self, system: Os) -> bool {
        if *self == Os::All || system == Os::All || *self == system {
            return true;
        }

        match self {
            Os::Posix => system.is_unix_like(),
            Os::Darwin => system == Os::MacOsX,
            _ => false,
        }
    }

    pub fn current() -> Os {
        match std::env::consts::OS {
            "linux" | "android" => Os::Linux,
            "macos" | "ios" => Os::MacOsX,
            "freebsd" => Os::FreeBsd,
            "solaris" | "illumos" => Os::Solaris,
            "windows" => Os::Windows,
            _ => Os::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Cpu {
    #[default]
    All,
    I386,
    I486,
    I586,
    I686,
    X64,
    Ppc,
    Ppc64,
    Source,
    Unknown,
}

impl Cpu {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cpu::All => "*",
            Cpu::I386 => "i386",
            Cpu::I486 => "i486",
            Cpu::I586 => "i586",
            Cpu::I686 => "i686",
            Cpu::X64 => "x86_64",
            Cpu::Ppc => "ppc",
            Cpu::Ppc64 => "ppc64",
            Cpu::Source => "src",
            Cpu::Unknown => "unknown",
        }
    }

    pub fn from_token(token: &str) -> Cpu {
        match token {
            "*" | "" => Cpu::All,
            "i386" => Cpu::I386,
            "i486" => Cpu::I486,
            "i586" => Cpu::I586,
            "i686" => Cpu::I686,
            "x86_64" | "amd64" => Cpu::X64,
            "ppc" => Cpu::Ppc,
            "ppc64" => Cpu::Ppc64,
            "src" => Cpu::Source,
            _ => Cpu::Unknown,
        }
    }

    fn is_x86_32(&self) -> bool {
        matches!(self, Cpu::I386 | Cpu::I486 | Cpu::I586 | Cpu::I686)
    }

    pub fn is_64bit(&self) -> bool {
        matches!(self, Cpu::X64 | Cpu::Ppc64)
    }

    /// The 32-bit CPU a 64-bit host can also run
    pub fn compat_32bit(&self) -> Option<Cpu> {
        match self {
            Cpu::X64 => Some(Cpu::I686),
            Cpu::Ppc64 => Some(Cpu::Ppc),
            _ => None,
        }
    }

    /// Whether something built for `self` can run on `system`.
    ///
    /// Within the 32-bit x86 family older CPUs run on newer ones. A 64-bit
    /// system only accepts 64-bit builds here; running 32-bit builds on it
    /// is a separate solver pass.
    pub fn is_compatible(&self, system: Cpu) -> bool {
        if *self == Cpu::All || system == Cpu::All || *self == system {
            return true;
        }

        self.is_x86_32() && system.is_x86_32() && *self <= system
    }

    pub fn current() -> Cpu {
        match std::env::consts::ARCH {
            "x86" => Cpu::I686,
            "x86_64" => Cpu::X64,
            "powerpc" => Cpu::Ppc,
            "powerpc64" => Cpu::Ppc64,
            _ => Cpu::Unknown,
        }
    }
}

/// An `os-cpu` pair such as `Linux-x86_64` or `*-src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Architecture {
    pub os: Os,
    pub cpu: Cpu,
}

impl Architecture {
    pub fn new(os: Os, cpu: Cpu) -> Self {
        Self { os, cpu }
    }

    pub fn current_system() -> Self {
        Self::new(Os::current(), Cpu::current())
    }

    /// Whether an implementation built for `self` satisfies `required`
    pub fn is_compatible(&self, required: &Architecture) -> bool {
        self.os.is_compatible(required.os) && self.cpu.is_compatible(required.cpu)
    }

    /// Replaces wildcards with the given host values
    pub fn resolve_against(&self, host: &Architecture) -> Architecture {
        Architecture {
            os: if self.os == Os::All { host.os } else { self.os },
            cpu: if self.cpu == Cpu::All { host.cpu } else { self.cpu },
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.cpu.as_str())
    }
}

impl FromStr for Architecture {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Architecture::default());
        }
        let (os, cpu) = s
            .split_once('-')
            .ok_or_else(|| SolverError::InvalidRequirements(format!("Invalid architecture \"{}\"", s)))?;
        Ok(Architecture::new(Os::from_token(os), Cpu::from_token(cpu)))
    }
}

impl Serialize for Architecture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Architecture {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Os {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Os {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Os::from_token(&text))
    }
}

//! Platform detection.
//!
//! The manager selects between per-platform artifact URLs through the
//! [`PlatformDetector`] collaborator, so URL selection stays mockable in tests
//! and portable across hosts.

/// Target platform an artifact is published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Windows,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "mac" | "darwin" => Ok(Platform::MacOs),
            "windows" | "win" => Ok(Platform::Windows),
            _ => Err(format!("unknown platform: {s}")),
        }
    }
}

/// One-shot capability query for the host platform.
pub trait PlatformDetector: Send + Sync {
    fn detect(&self) -> Platform;
}

/// Detects the platform from the compile-time target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlatform;

impl PlatformDetector for SystemPlatform {
    fn detect(&self) -> Platform {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Windows
        }
    }
}

/// A detector pinned to a fixed platform, for overrides and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedPlatform(pub Platform);

impl PlatformDetector for FixedPlatform {
    fn detect(&self) -> Platform {
        self.0
    }
}

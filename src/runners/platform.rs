// src/runners/platform.rs

/// Host-dependent test-runner command-line conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Flag prefix: `/` on Windows, `--` elsewhere.
    pub separator: &'static str,
    /// Whether the runner accepts `{sep}framework:<tag>`.
    pub supports_framework_flag: bool,
    /// Longest command line the OS accepts.
    pub max_command_length: usize,
}

impl Platform {
    pub const WINDOWS: Platform = Platform {
        separator: "/",
        supports_framework_flag: true,
        max_command_length: 8191,
    };

    pub const UNIX: Platform = Platform {
        separator: "--",
        supports_framework_flag: false,
        max_command_length: 131_072,
    };

    pub fn current() -> Self {
        if cfg!(windows) {
            Self::WINDOWS
        } else {
            Self::UNIX
        }
    }

    pub fn with_max_command_length(mut self, max: Option<usize>) -> Self {
        if let Some(max) = max {
            self.max_command_length = max;
        }
        self
    }

    pub fn flag(&self, name: &str) -> String {
        format!("{}{}", self.separator, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_only_changes_length() {
        let p = Platform::UNIX.with_max_command_length(Some(100));
        assert_eq!(p.max_command_length, 100);
        assert_eq!(p.flag("noshadow"), "--noshadow");
        assert_eq!(Platform::WINDOWS.with_max_command_length(None).flag("run=A"), "/run=A");
    }
}

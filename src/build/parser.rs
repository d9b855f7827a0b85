// src/build/parser.rs

//! Compiler diagnostics parsing.
//!
//! Recognised shapes:
//! - MSBuild: `path(line,col): error CS1002: ; expected [proj.csproj]`
//! - GCC / clang: `path:line:col: warning: unused variable`
//! - rustc: `error[E0308]: mismatched types` followed by `  --> path:line:col`

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{BuildResultItem, Identified};
use crate::types::Severity;

static MSBUILD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<file>[^(]+?)\((?P<line>\d+)(?:,(?P<col>\d+))?(?:,\d+,\d+)?\)\s*:\s*(?P<sev>error|warning)\s*(?P<code>[A-Za-z]+\d+)?\s*:\s*(?P<msg>.*?)(?:\s+\[[^\]]+\])?\s*$",
    )
    .expect("valid msbuild regex")
});

static GCC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>(?:[A-Za-z]:)?[^:\s][^:]*):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<sev>fatal error|error|warning):\s*(?P<msg>.*)$",
    )
    .expect("valid gcc regex")
});

static RUSTC_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sev>error|warning)(?:\[(?P<code>[A-Z]\d+)\])?:\s*(?P<msg>.+)$")
        .expect("valid rustc header regex")
});

static RUSTC_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-->\s*(?P<file>.+?):(?P<line>\d+):(?P<col>\d+)\s*$")
        .expect("valid rustc location regex")
});

/// Parse build output lines into diagnostics for `project`.
///
/// Relative file paths are resolved against `base_dir`. Duplicate
/// diagnostics (MSBuild repeats them in its summary) are reported once.
pub fn parse_diagnostics<'a, I>(project: &str, base_dir: &Path, lines: I) -> Vec<BuildResultItem>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut pending_header: Option<(Severity, String)> = None;

    let mut push = |item: BuildResultItem, items: &mut Vec<BuildResultItem>| {
        if seen.insert((item.identity(), item.severity)) {
            items.push(item);
        }
    };

    for line in lines {
        if let Some((severity, message)) = pending_header.take()
            && let Some(caps) = RUSTC_LOCATION.captures(line)
        {
            let item = BuildResultItem {
                project: project.to_string(),
                file: resolve(base_dir, &caps["file"]),
                line: number(caps.name("line").map(|m| m.as_str())),
                column: number(caps.name("col").map(|m| m.as_str())),
                severity,
                message,
            };
            push(item, &mut items);
            continue;
        }

        if let Some(caps) = MSBUILD.captures(line) {
            let message = match caps.name("code") {
                Some(code) => format!("{}: {}", code.as_str(), &caps["msg"]),
                None => caps["msg"].to_string(),
            };
            let item = BuildResultItem {
                project: project.to_string(),
                file: resolve(base_dir, caps["file"].trim()),
                line: number(caps.name("line").map(|m| m.as_str())),
                column: number(caps.name("col").map(|m| m.as_str())),
                severity: severity_of(&caps["sev"]),
                message,
            };
            push(item, &mut items);
        } else if let Some(caps) = GCC.captures(line) {
            let item = BuildResultItem {
                project: project.to_string(),
                file: resolve(base_dir, &caps["file"]),
                line: number(caps.name("line").map(|m| m.as_str())),
                column: number(caps.name("col").map(|m| m.as_str())),
                severity: severity_of(&caps["sev"]),
                message: caps["msg"].trim().to_string(),
            };
            push(item, &mut items);
        } else if let Some(caps) = RUSTC_HEADER.captures(line) {
            let message = match caps.name("code") {
                Some(code) => format!("{}: {}", code.as_str(), &caps["msg"]),
                None => caps["msg"].to_string(),
            };
            pending_header = Some((severity_of(&caps["sev"]), message));
        }
    }

    items
}

fn severity_of(text: &str) -> Severity {
    text.parse().unwrap_or(Severity::Error)
}

fn number(text: Option<&str>) -> u32 {
    text.and_then(|t| t.parse().ok()).unwrap_or(0)
}

fn resolve(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_msbuild_lines() {
        let out = [
            "Build started.",
            r"Program.cs(12,5): error CS1002: ; expected [/repo/Core/Core.csproj]",
            r"Util.cs(3,1): warning CS0168: The variable 'x' is declared but never used",
            r"Program.cs(12,5): error CS1002: ; expected [/repo/Core/Core.csproj]",
        ];
        let items = parse_diagnostics("Core", Path::new("/repo/Core"), out);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].file, PathBuf::from("/repo/Core/Program.cs"));
        assert_eq!((items[0].line, items[0].column), (12, 5));
        assert_eq!(items[0].severity, Severity::Error);
        assert_eq!(items[0].message, "CS1002: ; expected");
        assert_eq!(items[1].severity, Severity::Warning);
    }

    #[test]
    fn parses_gcc_lines() {
        let items = parse_diagnostics(
            "native",
            Path::new("/repo"),
            ["/repo/src/a.c:4:10: fatal error: foo.h: No such file or directory"],
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file, PathBuf::from("/repo/src/a.c"));
        assert_eq!(items[0].line, 4);
        assert_eq!(items[0].message, "foo.h: No such file or directory");
    }

    #[test]
    fn parses_two_line_rustc_diagnostics() {
        let items = parse_diagnostics(
            "core",
            Path::new("/repo"),
            [
                "error[E0308]: mismatched types",
                "  --> src/main.rs:4:5",
                "warning: unused import",
                "some unrelated line",
            ],
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file, PathBuf::from("/repo/src/main.rs"));
        assert_eq!(items[0].message, "E0308: mismatched types");
    }

    #[test]
    fn ignores_noise() {
        let items = parse_diagnostics(
            "Core",
            Path::new("/repo"),
            ["Build succeeded.", "    0 Warning(s)", "    0 Error(s)"],
        );
        assert!(items.is_empty());
    }
}

// src/runners/command_line.rs

use std::path::Path;

use crate::exec::ProcessSpec;
use crate::model::TestRunInfo;
use crate::runners::locator::RunnerGroupKey;
use crate::runners::platform::Platform;
use crate::types::RunnerKind;

/// A built runner command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub spec: ProcessSpec,
    /// Whether `{sep}run=` made it onto the command line.
    pub includes_run_list: bool,
    /// Length of the command line as the OS would see it.
    pub length: usize,
}

/// Assemble the runner arguments for one group.
///
/// Layout: `[framework] noshadow xml=<file> [exclude=<cats>] <assemblies...>
/// [run=<names>]`. The run list is dropped whole if it would push the command
/// line past `platform.max_command_length`.
pub fn build_invocation(
    platform: &Platform,
    key: &RunnerGroupKey,
    entries: &[&TestRunInfo],
    kind: RunnerKind,
    categories_to_ignore: &[String],
    result_file: &Path,
) -> Invocation {
    let mut args: Vec<String> = Vec::new();
    // Characters added by quoting paths on the real command line.
    let mut quoting = 0;

    if platform.supports_framework_flag && !key.tag.is_empty() {
        args.push(platform.flag(&format!("framework:{}", key.tag)));
    }
    args.push(platform.flag("noshadow"));
    args.push(platform.flag(&format!("xml={}", result_file.display())));
    quoting += 2;

    if !categories_to_ignore.is_empty() {
        args.push(platform.flag(&format!("exclude={}", categories_to_ignore.join(","))));
    }

    for entry in entries {
        args.push(entry.assembly().display().to_string());
        quoting += 2;
    }

    let mut length = key.executable.display().to_string().len()
        + args.iter().map(|a| a.len() + 1).sum::<usize>()
        + quoting;

    let names = run_list(entries, kind);
    let mut includes_run_list = false;
    if !names.is_empty() {
        let run_arg = platform.flag(&format!("run={}", names.join(",")));
        if length + 1 + run_arg.len() <= platform.max_command_length {
            length += 1 + run_arg.len();
            args.push(run_arg);
            includes_run_list = true;
        }
    }

    Invocation {
        spec: ProcessSpec::new(&key.executable).args(args),
        includes_run_list,
        length,
    }
}

/// Every requested test name across the group, first-seen order.
fn run_list(entries: &[&TestRunInfo], kind: RunnerKind) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        for name in entry.tests_for(kind) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

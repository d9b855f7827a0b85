// src/runners/nunit_xml.rs

//! NUnit 2.x result document parsing.
//!
//! The runner output is only ever read, never validated, so this is a
//! tolerant scanner rather than a full XML parser: it walks `<test-suite
//! type="Assembly">` and `<test-case>` tags in document order and stops
//! quietly where a truncated document ends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{StackFrame, TestResultItem};
use crate::types::{RunnerKind, TestOutcome};

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<test-suite\b(?P<suite>[^>]*)>|<test-case\b(?P<case>[^>]*?)(?P<close>/?)>"#)
        .expect("valid tag regex")
});

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>[A-Za-z_][\w:.-]*)\s*=\s*"(?P<value>[^"]*)""#).expect("valid attribute regex")
});

static MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<message>\s*(?:<!\[CDATA\[(?P<cdata>.*?)\]\]>|(?P<text>.*?))\s*</message>")
        .expect("valid message regex")
});

static STACK_TRACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<stack-trace>\s*(?:<!\[CDATA\[(?P<cdata>.*?)\]\]>|(?P<text>.*?))\s*</stack-trace>")
        .expect("valid stack-trace regex")
});

static FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*at\s+(?P<method>.+?)(?:\s+\[0x[0-9a-fA-F]+\])?(?:\s+in\s+(?P<file>.+?):(?:line\s+)?(?P<line>\d+))?\s*$",
    )
    .expect("valid stack frame regex")
});

const CASE_END: &str = "</test-case>";

/// Test cases found under one `<test-suite type="Assembly">`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAssembly {
    /// Suite name as written by the runner (usually the assembly path).
    pub name: String,
    pub items: Vec<TestResultItem>,
}

/// Parse a (possibly truncated) result document.
///
/// Test cases that appear before any assembly suite are attributed to
/// `fallback_assembly`.
pub fn parse_results(text: &str, runner: RunnerKind, fallback_assembly: &str) -> Vec<ParsedAssembly> {
    let mut assemblies: Vec<ParsedAssembly> = Vec::new();
    let mut current: Option<usize> = None;

    for caps in TAG.captures_iter(text) {
        if let Some(suite) = caps.name("suite") {
            let attrs = attributes(suite.as_str());
            if attrs
                .get("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("assembly"))
            {
                let name = attrs.get("name").cloned().unwrap_or_default();
                assemblies.push(ParsedAssembly {
                    name,
                    items: Vec::new(),
                });
                current = Some(assemblies.len() - 1);
            }
            continue;
        }

        let Some(case) = caps.name("case") else {
            continue;
        };
        let attrs = attributes(case.as_str());
        let Some(name) = attrs.get("name") else {
            continue;
        };

        let self_closing = caps.name("close").is_some_and(|c| !c.as_str().is_empty());
        let body = if self_closing {
            ""
        } else {
            let rest = &text[caps.get(0).map_or(0, |m| m.end())..];
            match rest.find(CASE_END) {
                Some(end) => &rest[..end],
                None => rest,
            }
        };

        let index = match current {
            Some(index) => index,
            None => {
                assemblies.push(ParsedAssembly {
                    name: fallback_assembly.to_string(),
                    items: Vec::new(),
                });
                let index = assemblies.len() - 1;
                current = Some(index);
                index
            }
        };
        let assembly = PathBuf::from(&assemblies[index].name);

        let mut item = TestResultItem::new(assembly, runner, name.clone(), outcome(&attrs));
        item.message = extract(&MESSAGE, body).unwrap_or_default();
        item.stack_trace = extract(&STACK_TRACE, body)
            .map(|trace| parse_stack_trace(&trace))
            .unwrap_or_default();
        assemblies[index].items.push(item);
    }

    assemblies
}

fn outcome(attrs: &HashMap<String, String>) -> TestOutcome {
    if let Some(result) = attrs.get("result") {
        return TestOutcome::from_nunit(result);
    }
    // NUnit 2.4 documents only carry executed/success.
    let flag = |key: &str| attrs.get(key).map(|v| v.eq_ignore_ascii_case("true"));
    match (flag("executed"), flag("success")) {
        (Some(false), _) => TestOutcome::Ignored,
        (_, Some(true)) => TestOutcome::Passed,
        (_, Some(false)) => TestOutcome::Failed,
        _ => TestOutcome::Ignored,
    }
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR.captures_iter(raw)
        .map(|c| (c["key"].to_string(), decode_entities(&c["value"])))
        .collect()
}

fn extract(re: &Regex, body: &str) -> Option<String> {
    let caps = re.captures(body)?;
    if let Some(cdata) = caps.name("cdata") {
        return Some(cdata.as_str().trim().to_string());
    }
    caps.name("text")
        .map(|t| decode_entities(t.as_str().trim()))
}

/// Parse `at Method() in file:line N` lines. Lines without a location keep
/// just the method.
pub fn parse_stack_trace(trace: &str) -> Vec<StackFrame> {
    trace
        .lines()
        .filter_map(|line| FRAME.captures(line))
        .map(|caps| StackFrame {
            method: caps["method"].trim().to_string(),
            file: caps.name("file").map(|f| PathBuf::from(f.as_str())),
            line: caps.name("line").and_then(|l| l.as_str().parse().ok()),
        })
        .collect()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<test-results name="/bin/a.dll" total="3" failures="1" not-run="1">
  <test-suite type="Assembly" name="/bin/a.dll" executed="True" result="Failure">
    <results>
      <test-suite type="Namespace" name="A">
        <results>
          <test-case name="A.Tests.Passes" executed="True" result="Success" success="True" />
          <test-case name="A.Tests.Fails" executed="True" result="Failure" success="False">
            <failure>
              <message><![CDATA[Expected: 1
  But was:  2]]></message>
              <stack-trace><![CDATA[at A.Tests.Fails() in c:\src\Tests.cs:line 12
at A.Helpers.Check() [0x00001] in /src/Helpers.cs:40
]]></stack-trace>
            </failure>
          </test-case>
          <test-case name="A.Tests.Later&lt;T&gt;" executed="False" result="Ignored">
            <reason><message>not &amp; ready</message></reason>
          </test-case>
        </results>
      </test-suite>
    </results>
  </test-suite>
</test-results>
"#;

    #[test]
    fn parses_outcomes_messages_and_frames() {
        let parsed = parse_results(DOC, RunnerKind::NUnit, "");
        assert_eq!(parsed.len(), 1);
        let items = &parsed[0].items;
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].outcome, TestOutcome::Passed);
        assert_eq!(items[1].outcome, TestOutcome::Failed);
        assert_eq!(items[1].assembly, Path::new("/bin/a.dll"));
        assert!(items[1].message.starts_with("Expected: 1"));
        assert_eq!(items[1].stack_trace.len(), 2);
        assert_eq!(items[1].stack_trace[0].method, "A.Tests.Fails()");
        assert_eq!(items[1].stack_trace[0].line, Some(12));
        assert_eq!(
            items[1].stack_trace[1].file.as_deref(),
            Some(Path::new("/src/Helpers.cs"))
        );

        assert_eq!(items[2].display_name, "A.Tests.Later<T>");
        assert_eq!(items[2].outcome, TestOutcome::Ignored);
        assert_eq!(items[2].message, "not & ready");
    }

    #[test]
    fn minimal_document_yields_one_failure() {
        let parsed = parse_results(
            r#"<test-results><test-case name="T1" result="Failure"/></test-results>"#,
            RunnerKind::NUnit,
            "/bin/a.dll",
        );
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].items.len(), 1);
        assert_eq!(parsed[0].items[0].display_name, "T1");
        assert_eq!(parsed[0].items[0].outcome, TestOutcome::Failed);
        assert_eq!(parsed[0].items[0].assembly, Path::new("/bin/a.dll"));
    }

    #[test]
    fn truncated_document_keeps_what_was_parsed() {
        let cut = DOC.find("A.Tests.Later").unwrap();
        let parsed = parse_results(&DOC[..cut], RunnerKind::NUnit, "");
        assert_eq!(parsed[0].items.len(), 2);
    }

    #[test]
    fn legacy_flags_without_result_attribute() {
        let parsed = parse_results(
            r#"<test-case name="T1" executed="True" success="False"/><test-case name="T2" executed="False"/>"#,
            RunnerKind::NUnit,
            "a.dll",
        );
        assert_eq!(parsed[0].items[0].outcome, TestOutcome::Failed);
        assert_eq!(parsed[0].items[1].outcome, TestOutcome::Ignored);
    }
}

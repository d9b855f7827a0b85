#![allow(dead_code)]

use std::path::PathBuf;

use watchtest::config::{EngineConfig, ExtensionConfig, ProjectConfig, RawConfigFile, RunnerConfig};
use watchtest::types::TriggerWhileRunningBehaviour;

/// Builder for `EngineConfig` to simplify test setup.
pub struct EngineConfigBuilder {
    config: RawConfigFile,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.build.program = PathBuf::from("build-tool");
        Self { config }
    }

    pub fn with_project(mut self, project: ProjectConfig) -> Self {
        self.config.project.push(project);
        self
    }

    pub fn with_default_runner(mut self, exe: &str) -> Self {
        self.runner().default = Some(PathBuf::from(exe));
        self
    }

    pub fn with_framework_runner(mut self, tag: &str, exe: &str) -> Self {
        self.runner()
            .frameworks
            .insert(tag.to_string(), PathBuf::from(exe));
        self
    }

    pub fn with_extension(mut self, provider: &str, extensions: &[&str]) -> Self {
        self.config.extension.push(ExtensionConfig {
            provider: provider.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        });
        self
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.config.engine.provider = Some(provider.to_string());
        self
    }

    pub fn with_behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.engine.triggered_while_running_behaviour = behaviour;
        self
    }

    pub fn with_deltas(mut self, enabled: bool) -> Self {
        self.config.engine.deltas = enabled;
        self
    }

    pub fn with_optimistic_build(mut self, enabled: bool) -> Self {
        self.config.engine.optimistic_build = enabled;
        self
    }

    pub fn with_max_command_length(mut self, max: usize) -> Self {
        self.config.engine.max_command_length = Some(max);
        self
    }

    pub fn with_build_args(mut self, args: &[&str]) -> Self {
        self.config.build.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    fn runner(&mut self) -> &mut RunnerConfig {
        self.config.runners.nunit.get_or_insert_with(RunnerConfig::default)
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProjectConfig`.
pub struct ProjectConfigBuilder {
    project: ProjectConfig,
}

impl ProjectConfigBuilder {
    /// Project `name` with its project file at `file` (absolute in tests).
    pub fn new(name: &str, file: &str) -> Self {
        Self {
            project: ProjectConfig {
                name: name.to_string(),
                file: PathBuf::from(file),
                watch: Vec::new(),
                assembly: None,
                framework: String::new(),
                references: Vec::new(),
            },
        }
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.project.watch.push(pattern.to_string());
        self
    }

    pub fn assembly(mut self, path: &str) -> Self {
        self.project.assembly = Some(PathBuf::from(path));
        self
    }

    pub fn framework(mut self, tag: &str) -> Self {
        self.project.framework = tag.to_string();
        self
    }

    pub fn references(mut self, name: &str) -> Self {
        self.project.references.push(name.to_string());
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.project
    }
}

/// NUnit 2.x result document for one assembly.
///
/// `cases` are `(name, result)` pairs, e.g. `("A.T1", "Failure")`.
pub fn nunit_xml(assembly: &str, cases: &[(&str, &str)]) -> String {
    nunit_document(&[(assembly, cases)])
}

/// One result document holding a suite per assembly, as a runner writes it
/// for a multi-assembly invocation.
pub fn nunit_document(suites: &[(&str, &[(&str, &str)])]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<test-results>\n");
    for (assembly, cases) in suites {
        xml.push_str(&format!(
            "  <test-suite type=\"Assembly\" name=\"{assembly}\">\n    <results>\n"
        ));
        for (name, result) in *cases {
            if result.eq_ignore_ascii_case("failure") {
                xml.push_str(&format!(
                    "      <test-case name=\"{name}\" executed=\"True\" result=\"{result}\">\n        <failure><message><![CDATA[{name} failed]]></message></failure>\n      </test-case>\n"
                ));
            } else {
                xml.push_str(&format!(
                    "      <test-case name=\"{name}\" executed=\"True\" result=\"{result}\" />\n"
                ));
            }
        }
        xml.push_str("    </results>\n  </test-suite>\n");
    }
    xml.push_str("</test-results>\n");
    xml
}

use crate::compiler::debug::DebugEndpoint;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Fully resolved, ready-to-execute launch of a Winstone server.
///
/// Produced fresh by [`ParameterCompiler::compile`](crate::compiler::ParameterCompiler::compile)
/// for every launch attempt. Extensions may adjust it before the process
/// is spawned; after that it is only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledLaunchPlan {
    /// Java executable used to start the server.
    pub executable: PathBuf,
    /// JVM options, in emission order.
    pub vm_args: Vec<String>,
    /// Classpath entries; the compiler emits only the launcher archive.
    pub classpath: Vec<String>,
    /// Launcher entry point.
    pub main_class: String,
    /// Launcher flags, in emission order.
    pub program_args: Vec<String>,
    pub working_directory: PathBuf,
    /// Extra environment for the process, on top of the inherited one.
    pub environment: BTreeMap<String, String>,
    /// Debugger address when the launch was compiled for debugging.
    pub debug_endpoint: Option<DebugEndpoint>,
}

impl CompiledLaunchPlan {
    /// Full argument vector passed to the executable.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.vm_args.len() + self.program_args.len() + 3);
        args.extend(self.vm_args.iter().cloned());
        if !self.classpath.is_empty() {
            args.push("-classpath".to_string());
            args.push(self.joined_classpath());
        }
        args.push(self.main_class.clone());
        args.extend(self.program_args.iter().cloned());
        args
    }

    /// Executable and arguments joined by spaces, for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.executable.to_string_lossy().into_owned();
        for arg in self.command_args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    fn joined_classpath(&self) -> String {
        let separator = if cfg!(windows) { ";" } else { ":" };
        self.classpath.join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> CompiledLaunchPlan {
        CompiledLaunchPlan {
            executable: PathBuf::from("/jdk/bin/java"),
            vm_args: vec!["-Xmx512m".to_string()],
            classpath: vec!["/lib/launcher.jar".to_string()],
            main_class: "winstone.Launcher".to_string(),
            program_args: vec!["--webroot=/app".to_string(), "--debug=5".to_string()],
            working_directory: PathBuf::from("/work"),
            environment: BTreeMap::new(),
            debug_endpoint: None,
        }
    }

    #[test]
    fn test_command_args_order() {
        assert_eq!(
            plan().command_args(),
            vec![
                "-Xmx512m",
                "-classpath",
                "/lib/launcher.jar",
                "winstone.Launcher",
                "--webroot=/app",
                "--debug=5",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_command_line_joins_classpath() {
        let mut plan = plan();
        plan.classpath.push("/lib/agent.jar".to_string());

        assert_eq!(
            plan.command_line(),
            "/jdk/bin/java -Xmx512m -classpath /lib/launcher.jar:/lib/agent.jar winstone.Launcher --webroot=/app --debug=5"
        );
    }
}

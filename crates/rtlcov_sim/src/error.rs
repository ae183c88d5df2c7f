//! Error types for simulator invocation.

/// Errors from driving the external simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// The child process could not be spawned at all.
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        /// The executable that could not be started.
        program: String,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// The compile step exited with a non-zero status.
    #[error("compilation failed with exit code {code}")]
    Compile {
        /// The child's exit code (1 when unavailable).
        code: i32,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The run step exited with a non-zero status.
    #[error("simulation failed with exit code {code}")]
    Run {
        /// The child's exit code (1 when unavailable).
        code: i32,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
}

impl SimulatorError {
    /// The exit code the CLI should bubble up for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimulatorError::Launch { .. } => 1,
            SimulatorError::Compile { code, .. } | SimulatorError::Run { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display() {
        let err = SimulatorError::Compile {
            code: 2,
            stdout: String::new(),
            stderr: "syntax error".to_string(),
        };
        assert_eq!(format!("{err}"), "compilation failed with exit code 2");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn launch_error_display() {
        let err = SimulatorError::Launch {
            program: "iverilog".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(format!("{err}").contains("failed to launch `iverilog`"));
        assert_eq!(err.exit_code(), 1);
    }
}

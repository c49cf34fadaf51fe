//! Interpreter selection for `run_code` scripts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterType {
    Python,
    R,
    Shell,
}

impl InterpreterType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Some(Self::Python),
            "r" | "rscript" => Some(Self::R),
            "shell" | "sh" | "bash" => Some(Self::Shell),
            _ => None,
        }
    }

    /// File extension for scripts written into the workspace.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::R => "R",
            Self::Shell => "sh",
        }
    }
}

/// Program used to launch each interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterPrograms {
    pub python: String,
    pub r: String,
    pub shell: String,
}

impl Default for InterpreterPrograms {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            r: "Rscript".into(),
            shell: "/bin/sh".into(),
        }
    }
}

impl InterpreterPrograms {
    pub fn program_for(&self, ty: InterpreterType) -> &str {
        match ty {
            InterpreterType::Python => &self.python,
            InterpreterType::R => &self.r,
            InterpreterType::Shell => &self.shell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(InterpreterType::from_name("Python"), Some(InterpreterType::Python));
        assert_eq!(InterpreterType::from_name("Rscript"), Some(InterpreterType::R));
        assert_eq!(InterpreterType::from_name("sh"), Some(InterpreterType::Shell));
        assert_eq!(InterpreterType::from_name("cobol"), None);
    }

    #[test]
    fn test_programs() {
        let programs = InterpreterPrograms::default();
        assert_eq!(programs.program_for(InterpreterType::Python), "python3");
        assert_eq!(InterpreterType::R.extension(), "R");
    }
}

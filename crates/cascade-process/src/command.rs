use std::collections::HashMap;

use cascade_paths::AbsoluteSystemPathBuf;

/// A shell invocation to spawn: the OS's default shell, handed the task's command string as a
/// single argument, run with the project folder as the working directory.
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    args: Vec<String>,
    cwd: AbsoluteSystemPathBuf,
    env: HashMap<String, String>,
    label: String,
}

/// Converts Windows-style (`\`) path separators to the host's own separator convention, but only
/// in the command's head (the first whitespace-delimited token, i.e. the program being run) —
/// project scripts sometimes hardcode a `.bin\tool`-style head regardless of the host the package
/// manager records them for, and the rest of the command line is left untouched since arguments
/// may legitimately contain literal backslashes.
fn convert_head_path_separators(command: &str) -> String {
    let mut parts = command.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let rest = parts.next();

    #[cfg(windows)]
    let converted_head = head.replace('/', "\\");
    #[cfg(not(windows))]
    let converted_head = head.replace('\\', "/");

    match rest {
        Some(rest) => format!("{converted_head} {rest}"),
        None => converted_head,
    }
}

impl Command {
    /// Builds the platform default-shell invocation of `command` in `cwd`.
    ///
    /// On Unix this is `sh -c <command>`; on Windows, `cmd.exe /C <command>`. The command's head
    /// (see [`convert_head_path_separators`]) has its path separators converted for the host
    /// shell before either branch runs. `label` is used only for logging and test assertions.
    pub fn shell(command: &str, cwd: AbsoluteSystemPathBuf, env: HashMap<String, String>) -> Self {
        let command = convert_head_path_separators(command);
        let label = command.clone();
        #[cfg(windows)]
        let (program, args) = ("cmd.exe".to_string(), vec!["/C".to_string(), command]);
        #[cfg(not(windows))]
        let (program, args) = ("sh".to_string(), vec!["-c".to_string(), command]);

        Self { program, args, cwd, env, label }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cwd(&self) -> &AbsoluteSystemPathBuf {
        &self.cwd
    }
}

impl From<Command> for tokio::process::Command {
    fn from(command: Command) -> Self {
        let mut tokio_command = tokio::process::Command::new(&command.program);
        tokio_command
            .args(&command.args)
            .current_dir(command.cwd.as_path())
            .envs(&command.env)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        tokio_command
    }
}

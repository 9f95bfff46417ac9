use crate::error::CoreError;
use chrono::Local;
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::Write;

/// Append-only transcript of one session's commands and raw writes. Interior
/// mutability (`RefCell`) so the engine can log from `&self` methods without
/// threading `&mut` through every step of the state machine.
pub struct SessionLog {
    file: RefCell<Option<File>>,
    enabled: bool,
}

impl SessionLog {
    pub fn new() -> Self {
        SessionLog {
            file: RefCell::new(None),
            enabled: false,
        }
    }

    pub fn enable(&mut self, path: &str) -> Result<(), CoreError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(CoreError::IoError)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(true)
            .open(path)
            .map_err(CoreError::IoError)?;

        writeln!(file, "{}", "=".repeat(80)).map_err(CoreError::IoError)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        writeln!(file, "SESSION START: {}", timestamp).map_err(CoreError::IoError)?;
        writeln!(file, "{}", "=".repeat(80)).map_err(CoreError::IoError)?;
        file.flush().map_err(CoreError::IoError)?;

        *self.file.borrow_mut() = Some(file);
        self.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self) {
        if self.enabled {
            if let Some(mut file) = self.file.borrow_mut().take() {
                let _ = writeln!(file, "\n{}", "=".repeat(80));
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                let _ = writeln!(file, "SESSION END: {}", timestamp);
                let _ = writeln!(file, "{}", "=".repeat(80));
            }
            self.enabled = false;
        }
    }

    pub fn log_command(&self, command: &str, output: &str) -> Result<(), CoreError> {
        let mut file_ref = self.file.borrow_mut();
        let Some(file) = file_ref.as_mut() else {
            return Ok(());
        };
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        writeln!(file, "\n{}", "-".repeat(80)).map_err(CoreError::IoError)?;
        writeln!(file, "Command Executed [{}]", timestamp).map_err(CoreError::IoError)?;
        writeln!(file, "{}", "-".repeat(80)).map_err(CoreError::IoError)?;
        writeln!(file, "Input:").map_err(CoreError::IoError)?;
        writeln!(file, "{}", command).map_err(CoreError::IoError)?;

        writeln!(file, "\nOutput:").map_err(CoreError::IoError)?;
        writeln!(file, "{}", output.trim()).map_err(CoreError::IoError)?;

        writeln!(file, "{}", "-".repeat(80)).map_err(CoreError::IoError)?;
        file.flush().map_err(CoreError::IoError)?;
        Ok(())
    }

    pub fn write_raw(&self, data: &[u8]) -> Result<(), CoreError> {
        let mut file_ref = self.file.borrow_mut();
        let Some(file) = file_ref.as_mut() else {
            return Ok(());
        };
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        writeln!(file, "\n{}", "-".repeat(80)).map_err(CoreError::IoError)?;
        writeln!(file, "Raw Data Written [{}]", timestamp).map_err(CoreError::IoError)?;
        writeln!(file, "{}", "-".repeat(80)).map_err(CoreError::IoError)?;

        writeln!(file, "Hex: {:02X?}", data).map_err(CoreError::IoError)?;
        if let Ok(text) = String::from_utf8(data.to_vec()) {
            writeln!(file, "Text: {}", text).map_err(CoreError::IoError)?;
        }

        writeln!(file, "{}", "-".repeat(80)).map_err(CoreError::IoError)?;
        file.flush().map_err(CoreError::IoError)?;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    pub fn write(&self, data: &str) -> Result<(), CoreError> {
        self.write_raw(data.as_bytes())
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn enable_then_log_command_writes_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.log");
        let mut log = SessionLog::new();
        log.enable(path.to_str().unwrap()).unwrap();
        log.log_command("show version", "VRP (R) software").unwrap();
        log.disable();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("show version"));
        assert!(contents.contains("VRP (R) software"));
        assert!(contents.contains("SESSION START"));
        assert!(contents.contains("SESSION END"));
    }

    #[test]
    fn disabled_log_is_a_no_op() {
        let log = SessionLog::new();
        assert!(!log.is_active());
        assert!(log.log_command("show version", "output").is_ok());
    }
}

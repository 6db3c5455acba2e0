use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::warn;

use crate::error::DisplayError;

/// Fixed area a rendered plot is scaled into when displayed.
pub const DISPLAY_SIZE: (u32, u32) = (400, 300);

/// Surface results are shown on.
pub trait Presenter {
    /// Modal info or error message.
    fn show_message(&mut self, title: &str, body: &str);

    /// Shows the image stored at `path` in the display area.
    fn show_image(&mut self, path: &Path) -> Result<(), DisplayError>;
}

/// Writes messages and image notices to a text stream.
pub struct ConsolePresenter<W: Write> {
    out: W,
}

impl<W: Write> ConsolePresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(error) = writeln!(self.out, "{line}") {
            warn!(%error, "failed to write to console");
        }
    }
}

impl ConsolePresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Presenter for ConsolePresenter<W> {
    fn show_message(&mut self, title: &str, body: &str) {
        self.write_line(&format!("[{title}] {body}"));
    }

    fn show_image(&mut self, path: &Path) -> Result<(), DisplayError> {
        let metadata = fs::metadata(path).map_err(|source| DisplayError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() == 0 {
            return Err(DisplayError::EmptyImage(path.to_path_buf()));
        }

        let (width, height) = DISPLAY_SIZE;
        self.write_line(&format!(
            "[Plot] {} ({width}x{height})",
            path.display()
        ));
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    use super::Presenter;
    use crate::error::DisplayError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Shown {
        Message { title: String, body: String },
        Image(PathBuf),
    }

    /// Records everything shown; `show_image` fails when `broken_display` is set.
    #[derive(Debug, Default)]
    pub struct RecordingPresenter {
        pub shown: Vec<Shown>,
        pub broken_display: bool,
    }

    impl RecordingPresenter {
        pub fn messages(&self) -> Vec<(String, String)> {
            self.shown
                .iter()
                .filter_map(|event| match event {
                    Shown::Message { title, body } => Some((title.clone(), body.clone())),
                    Shown::Image(_) => None,
                })
                .collect()
        }
    }

    impl Presenter for RecordingPresenter {
        fn show_message(&mut self, title: &str, body: &str) {
            self.shown.push(Shown::Message {
                title: title.to_string(),
                body: body.to_string(),
            });
        }

        fn show_image(&mut self, path: &Path) -> Result<(), DisplayError> {
            if self.broken_display {
                return Err(DisplayError::EmptyImage(path.to_path_buf()));
            }
            self.shown.push(Shown::Image(path.to_path_buf()));
            Ok(())
        }
    }
}

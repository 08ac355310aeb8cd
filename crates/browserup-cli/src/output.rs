//! Output formatting for data commands.
//!
//! Lifecycle commands narrate through the logger; commands whose point is
//! data (`info`, `status`) write through here and honor `--format json`.

use std::io::Write;

use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter handling table and JSON formats.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a formatter for the chosen format.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Whether JSON output is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Writes a value in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Human-readable rendering for a command's output value.
pub trait TableDisplay {
    /// Writes the table form of the value.
    ///
    /// # Errors
    ///
    /// Returns an error when writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
    }

    impl TableDisplay for Sample {
        fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
            writeln!(writer, "name: {}", self.name)?;
            Ok(())
        }
    }

    #[test]
    fn json_format_emits_json() {
        let format = OutputFormat::new(Format::Json);
        let mut buf = Vec::new();
        format.write(&mut buf, &Sample { name: "x" }).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("\"name\": \"x\""));
    }

    #[test]
    fn table_format_uses_table_display() {
        let format = OutputFormat::new(Format::Table);
        let mut buf = Vec::new();
        format.write(&mut buf, &Sample { name: "x" }).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "name: x\n");
    }
}
